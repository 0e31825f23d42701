// SPDX-License-Identifier: MPL-2.0

//! The per-device handle and its lifecycle state machine.
//!
//! Bring-up walks the states below from left to right, one transition per
//! acquired resource. Tear-down walks them back from whatever state was
//! reached, releasing exactly the resources acquired so far:
//!
//! ```text
//! Unbound -> Enabled -> RegionsReserved -> RegistersMapped -> SharedMemoryMapped
//!         -> NodePublished -> [InterruptsProvisioned] -> Active
//! ```
//!
//! `InterruptsProvisioned` is only entered on MSI-X capable revisions whose
//! IVPosition register is non-zero.

use device_id::{DeviceId, MinorId};

use crate::{
    HostServices,
    config::QdemoConfig,
    interrupt::{self, MsixVectors},
    io_mem::IoMem,
    node::{self, DeviceIdentity, PublishedNode},
    pci::{BarInfo, PciDevice, PciDeviceCommonCfgOffset, PciDeviceLocation},
    prelude::*,
    regs::{MSIX_BAR, MSIX_REVISION, REGISTERS_BAR, Register, SHARED_MEMORY_BAR},
    resource::{self, BarWindow},
};

/// The lifecycle states of a device handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProbeState {
    Unbound,
    Enabled,
    RegionsReserved,
    RegistersMapped,
    SharedMemoryMapped,
    NodePublished,
    InterruptsProvisioned,
    Active,
}

/// What a transition needs besides the handle itself.
pub(crate) struct ProbeContext<'a> {
    pub host: &'a HostServices,
    pub identity: &'a DeviceIdentity,
    pub config: &'a QdemoConfig,
}

/// The driver's state for one attached device.
#[derive(Debug)]
pub struct QdemoDevice {
    minor: MinorId,
    state: ProbeState,
    pci: Option<Arc<dyn PciDevice>>,
    revision: u8,
    bars: [Option<BarInfo>; 3],
    registers: Option<BarWindow>,
    shared_memory: Option<BarWindow>,
    ivposition: u32,
    vectors: MsixVectors,
    node: Option<PublishedNode>,
}

impl QdemoDevice {
    /// Creates an unbound handle owning `minor`.
    pub(crate) fn new(minor: MinorId) -> Self {
        Self {
            minor,
            state: ProbeState::Unbound,
            pci: None,
            revision: 0,
            bars: [None; 3],
            registers: None,
            shared_memory: None,
            ivposition: 0,
            vectors: MsixVectors::default(),
            node: None,
        }
    }

    pub fn minor(&self) -> MinorId {
        self.minor
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// The location of the bound PCI function.
    pub fn location(&self) -> Option<PciDeviceLocation> {
        self.pci.as_ref().map(|pci| pci.location())
    }

    /// The revision read from the configuration space at probe time.
    pub fn revision(&self) -> u8 {
        self.revision
    }

    /// The BAR0, BAR1 and BAR2 resources recorded at probe time.
    pub fn bars(&self) -> &[Option<BarInfo>; 3] {
        &self.bars
    }

    /// The value of the IVPosition register, or zero if it was not read.
    pub fn ivposition(&self) -> u32 {
        self.ivposition
    }

    /// The mapped register window.
    pub fn registers(&self) -> Option<&Arc<dyn IoMem>> {
        self.registers.as_ref().map(BarWindow::mem)
    }

    /// The mapped shared memory window.
    pub fn shared_memory(&self) -> Option<&Arc<dyn IoMem>> {
        self.shared_memory.as_ref().map(BarWindow::mem)
    }

    pub fn vectors(&self) -> &MsixVectors {
        &self.vectors
    }

    /// The device number of the published node.
    pub fn node_id(&self) -> Option<DeviceId> {
        self.node.as_ref().map(PublishedNode::id)
    }

    pub fn node_name(&self) -> Option<&str> {
        self.node.as_ref().map(PublishedNode::name)
    }

    /// Walks the handle from `Unbound` to `Active` for `pci`.
    ///
    /// On failure every state entered so far is unwound and the handle is
    /// `Unbound` again.
    pub(crate) fn bring_up(&mut self, pci: Arc<dyn PciDevice>, ctx: &ProbeContext) -> Result<()> {
        debug_assert_eq!(self.state, ProbeState::Unbound);
        self.pci = Some(pci.clone());

        while self.state != ProbeState::Active {
            match self.advance(&*pci, ctx) {
                Ok(next) => self.state = next,
                Err(error) => {
                    error!(
                        "{}: probe failed in state {:?}: {}",
                        pci.location(),
                        self.state,
                        error
                    );
                    self.tear_down(ctx);
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    /// Walks the handle back to `Unbound`, releasing every held resource.
    ///
    /// Every step runs regardless of what the previous steps did.
    pub(crate) fn tear_down(&mut self, ctx: &ProbeContext) {
        let Some(pci) = self.pci.clone() else {
            debug_assert_eq!(self.state, ProbeState::Unbound);
            return;
        };
        while self.state != ProbeState::Unbound {
            self.state = self.retreat(&*pci, ctx);
        }
        self.pci = None;
    }

    /// Performs the transition out of the current state.
    fn advance(&mut self, pci: &dyn PciDevice, ctx: &ProbeContext) -> Result<ProbeState> {
        let location = pci.location();
        let next = match self.state {
            ProbeState::Unbound => {
                pci.enable().map_err(Error::EnableFailed)?;
                ProbeState::Enabled
            }
            ProbeState::Enabled => {
                pci.request_regions(DRIVER_NAME)
                    .map_err(Error::RegionReservationFailed)?;
                self.read_config(pci, ctx);
                ProbeState::RegionsReserved
            }
            ProbeState::RegionsReserved => {
                let window = resource::reserve_and_map(pci, &*ctx.host.mapper, REGISTERS_BAR)?;
                self.registers = Some(window);
                ProbeState::RegistersMapped
            }
            ProbeState::RegistersMapped => {
                let window =
                    resource::reserve_and_map(pci, &*ctx.host.mapper, SHARED_MEMORY_BAR)?;
                info!("{}: BAR2 map: {:#x}", location, window.mem().base());
                self.shared_memory = Some(window);
                ProbeState::SharedMemoryMapped
            }
            ProbeState::SharedMemoryMapped => {
                let id = ctx
                    .identity
                    .device_id(self.minor)
                    .ok_or(Error::NodePublishFailed(Errno::InvalidArgs))?;
                let node = node::publish_node(&*ctx.host.chrdev, ctx.identity, id)?;
                self.node = Some(node);
                ProbeState::NodePublished
            }
            ProbeState::NodePublished => {
                if self.revision != MSIX_REVISION {
                    ProbeState::Active
                } else if self.read_ivposition(location)? == 0 {
                    ProbeState::Active
                } else {
                    self.vectors = interrupt::request_vectors(
                        pci,
                        &*ctx.host.msix,
                        self.minor,
                        ctx.config.msix_vectors,
                    )?;
                    ProbeState::InterruptsProvisioned
                }
            }
            ProbeState::InterruptsProvisioned => ProbeState::Active,
            ProbeState::Active => ProbeState::Active,
        };
        Ok(next)
    }

    /// Performs the transition back into the previous state.
    fn retreat(&mut self, pci: &dyn PciDevice, ctx: &ProbeContext) -> ProbeState {
        match self.state {
            ProbeState::Active => {
                if self.vectors.is_empty() {
                    ProbeState::NodePublished
                } else {
                    ProbeState::InterruptsProvisioned
                }
            }
            ProbeState::InterruptsProvisioned => {
                interrupt::release_vectors(&*ctx.host.msix, &mut self.vectors);
                ProbeState::NodePublished
            }
            ProbeState::NodePublished => {
                self.pci = None;
                if let Some(node) = self.node.take() {
                    node::unpublish_node(&*ctx.host.chrdev, ctx.identity, node);
                }
                ProbeState::SharedMemoryMapped
            }
            ProbeState::SharedMemoryMapped => {
                if let Some(window) = self.shared_memory.take() {
                    resource::unmap(&*ctx.host.mapper, window);
                }
                ProbeState::RegistersMapped
            }
            ProbeState::RegistersMapped => {
                if let Some(window) = self.registers.take() {
                    resource::unmap(&*ctx.host.mapper, window);
                }
                ProbeState::RegionsReserved
            }
            ProbeState::RegionsReserved => {
                pci.release_regions();
                self.revision = 0;
                self.ivposition = 0;
                self.bars = [None; 3];
                ProbeState::Enabled
            }
            ProbeState::Enabled => {
                pci.disable();
                ProbeState::Unbound
            }
            ProbeState::Unbound => ProbeState::Unbound,
        }
    }

    fn read_config(&mut self, pci: &dyn PciDevice, ctx: &ProbeContext) {
        let location = pci.location();
        self.revision = pci.read_config_u8(PciDeviceCommonCfgOffset::RevisionId as u16);
        info!(
            "{}: device {}, revision: {}",
            location,
            ctx.identity.first().with_minor(self.minor),
            self.revision
        );

        for (bar, slot) in [REGISTERS_BAR, MSIX_BAR, SHARED_MEMORY_BAR]
            .into_iter()
            .zip(self.bars.iter_mut())
        {
            *slot = pci.resource(bar);
            let (base, len) = slot.map_or((0, 0), |info| (info.base, info.len));
            info!("{}: BAR{}: {:#x}, {}", location, bar, base, len);
        }
    }

    fn read_ivposition(&mut self, location: PciDeviceLocation) -> Result<u32> {
        let registers = self
            .registers
            .as_ref()
            .ok_or(Error::InterruptProvisioningFailed(Errno::IoFailed))?;
        let ivposition = registers
            .mem()
            .read_u32(Register::IvPosition.offset())
            .map_err(Error::InterruptProvisioningFailed)?;
        info!(
            "{}: device ivposition: {}, MSI-X: {}",
            location,
            ivposition,
            if ivposition == 0 { "no" } else { "yes" }
        );
        self.ivposition = ivposition;
        Ok(ivposition)
    }
}
