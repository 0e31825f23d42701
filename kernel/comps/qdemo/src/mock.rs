// SPDX-License-Identifier: MPL-2.0

//! A simulated host for driving the driver in tests.
//!
//! [`MockHost`] implements every host subsystem the driver consumes. It
//! records each call as an [`Event`], tracks which resources are currently
//! held, and panics on releases of resources that are not held. A [`Failure`]
//! armed with [`MockHost::arm`] makes the next matching call fail once.

use alloc::collections::{BTreeMap, BTreeSet};

use device_id::{DeviceId, MajorId, MinorId};
use spin::Mutex;

use crate::{
    HostServices,
    chrdev::{CdevHandle, CharDeviceSubsystem, ClassHandle, FileOperations},
    io_mem::{IoMapper, IoMem, check_range},
    pci::{
        BarInfo, MsixController, PciBus, PciDevice, PciDeviceCommonCfgOffset, PciDeviceId,
        PciDeviceLocation, PciDriver,
    },
    prelude::*,
    regs::Register,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Enable { location: PciDeviceLocation },
    Disable { location: PciDeviceLocation },
    RequestRegions { location: PciDeviceLocation, owner: String },
    ReleaseRegions { location: PciDeviceLocation },
    Ioremap { phys: u64, len: usize },
    Iounmap { phys: u64 },
    RequestVector { entry: u16, irq: u32, name: String },
    FreeVector { entry: u16, irq: u32 },
    AllocChrdevRegion { first: DeviceId, count: u32 },
    UnregisterChrdevRegion { first: DeviceId, count: u32 },
    ClassCreate { name: String },
    ClassDestroy,
    CdevAdd { id: DeviceId },
    CdevDel { id: DeviceId },
    DeviceCreate { id: DeviceId, name: String },
    DeviceDestroy { id: DeviceId },
    RegisterDriver { name: String },
    UnregisterDriver { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    Enable,
    RequestRegions,
    Ioremap { phys: u64 },
    /// The mapping succeeds but is shorter than requested.
    ShortIoremap { phys: u64 },
    RequestVector { entry: u16 },
    AllocChrdevRegion,
    ClassCreate,
    CdevAdd,
    DeviceCreate,
    RegisterDriver,
}

struct Mapping {
    phys: u64,
}

struct Cdev {
    id: DeviceId,
    fops: Arc<dyn FileOperations>,
}

struct HostState {
    events: Vec<Event>,
    armed: Vec<Failure>,
    enabled: BTreeSet<PciDeviceLocation>,
    regions: BTreeSet<PciDeviceLocation>,
    mappings: BTreeMap<usize, Mapping>,
    next_virt: usize,
    ivpositions: BTreeMap<u64, u32>,
    vectors: BTreeMap<u32, u16>,
    next_irq: u32,
    chrdev_regions: BTreeMap<DeviceId, u32>,
    next_major: u16,
    classes: BTreeSet<u64>,
    next_class: u64,
    cdevs: BTreeMap<u64, Cdev>,
    next_cdev: u64,
    nodes: BTreeMap<DeviceId, String>,
}

impl HostState {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            armed: Vec::new(),
            enabled: BTreeSet::new(),
            regions: BTreeSet::new(),
            mappings: BTreeMap::new(),
            next_virt: 0xffff_c900_0000_0000,
            ivpositions: BTreeMap::new(),
            vectors: BTreeMap::new(),
            next_irq: 32,
            chrdev_regions: BTreeMap::new(),
            next_major: 240,
            classes: BTreeSet::new(),
            next_class: 1,
            cdevs: BTreeMap::new(),
            next_cdev: 1,
            nodes: BTreeMap::new(),
        }
    }

    fn take_failure(&mut self, failure: Failure) -> bool {
        let Some(pos) = self.armed.iter().position(|armed| *armed == failure) else {
            return false;
        };
        self.armed.remove(pos);
        true
    }
}

#[derive(Debug)]
pub(crate) struct MockIoMem {
    base: usize,
    data: Mutex<Vec<u8>>,
}

impl IoMem for MockIoMem {
    fn base(&self) -> usize {
        self.base
    }

    fn len(&self) -> usize {
        self.data.lock().len()
    }

    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> core::result::Result<(), Errno> {
        let data = self.data.lock();
        check_range(offset, buf.len(), data.len())?;
        buf.copy_from_slice(&data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_bytes(&self, offset: usize, buf: &[u8]) -> core::result::Result<(), Errno> {
        let mut data = self.data.lock();
        check_range(offset, buf.len(), data.len())?;
        data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

/// Describes a simulated PCI function before it is plugged into a [`MockHost`].
#[derive(Debug, Clone)]
pub(crate) struct MockPciDeviceBuilder {
    location: PciDeviceLocation,
    id: PciDeviceId,
    revision: u8,
    ivposition: u32,
    bars: [Option<BarInfo>; 6],
}

impl MockPciDeviceBuilder {
    pub(crate) fn location(mut self, location: PciDeviceLocation) -> Self {
        self.location = location;
        self
    }

    pub(crate) fn ids(mut self, vendor_id: u16, device_id: u16) -> Self {
        self.id.vendor_id = vendor_id;
        self.id.device_id = device_id;
        self
    }

    pub(crate) fn revision(mut self, revision: u8) -> Self {
        self.revision = revision;
        self
    }

    /// Sets the value of the IVPosition register in BAR0.
    pub(crate) fn ivposition(mut self, ivposition: u32) -> Self {
        self.ivposition = ivposition;
        self
    }

    pub(crate) fn bar(mut self, bar: u8, info: BarInfo) -> Self {
        self.bars[bar as usize] = Some(info);
        self
    }

    pub(crate) fn no_bar(mut self, bar: u8) -> Self {
        self.bars[bar as usize] = None;
        self
    }
}

/// A simulated PCI function.
#[derive(Debug)]
pub(crate) struct MockPciDevice {
    location: PciDeviceLocation,
    id: PciDeviceId,
    revision: u8,
    bars: [Option<BarInfo>; 6],
    host: Arc<Mutex<HostState>>,
}

impl core::fmt::Debug for HostState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostState")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl MockPciDevice {
    /// A function without BARs at `0000:00:04.0` that matches the driver.
    pub(crate) fn builder() -> MockPciDeviceBuilder {
        MockPciDeviceBuilder {
            location: PciDeviceLocation::new(0, 4, 0),
            id: PciDeviceId {
                vendor_id: 0x1234,
                device_id: 0x12e8,
                subsystem_vendor_id: 0x1af4,
                subsystem_id: 0x1100,
            },
            revision: 0,
            ivposition: 0,
            bars: [None; 6],
        }
    }

    /// A qdemo device in PCI slot `4 + slot` with a 4 KiB register BAR,
    /// a 4 KiB MSI-X BAR and 1 MiB of shared memory.
    pub(crate) fn qdemo(slot: u8) -> MockPciDeviceBuilder {
        let offset = slot as u64 * 0x1_0000;
        Self::builder()
            .location(PciDeviceLocation::new(0, 4 + slot, 0))
            .bar(0, BarInfo::memory(0xfebf_0000 + offset, 4096))
            .bar(1, BarInfo::memory(0xfebf_1000 + offset, 4096))
            .bar(2, BarInfo::memory(0xe000_0000 + offset * 0x100, 1 << 20))
    }
}

impl PciDevice for MockPciDevice {
    fn location(&self) -> PciDeviceLocation {
        self.location
    }

    fn device_id(&self) -> PciDeviceId {
        self.id
    }

    fn enable(&self) -> core::result::Result<(), Errno> {
        let mut host = self.host.lock();
        if host.take_failure(Failure::Enable) {
            return Err(Errno::IoFailed);
        }
        assert!(host.enabled.insert(self.location), "enabled twice");
        host.events.push(Event::Enable {
            location: self.location,
        });
        Ok(())
    }

    fn disable(&self) {
        let mut host = self.host.lock();
        assert!(host.enabled.remove(&self.location), "not enabled");
        host.events.push(Event::Disable {
            location: self.location,
        });
    }

    fn request_regions(&self, owner: &str) -> core::result::Result<(), Errno> {
        let mut host = self.host.lock();
        assert!(host.enabled.contains(&self.location), "not enabled");
        if host.take_failure(Failure::RequestRegions) {
            return Err(Errno::Busy);
        }
        assert!(host.regions.insert(self.location), "regions reserved twice");
        host.events.push(Event::RequestRegions {
            location: self.location,
            owner: owner.to_string(),
        });
        Ok(())
    }

    fn release_regions(&self) {
        let mut host = self.host.lock();
        assert!(host.regions.remove(&self.location), "regions not reserved");
        host.events.push(Event::ReleaseRegions {
            location: self.location,
        });
    }

    fn read_config_u8(&self, offset: u16) -> u8 {
        use PciDeviceCommonCfgOffset as Cfg;

        if offset == Cfg::RevisionId as u16 {
            return self.revision;
        }
        let field = |value: u16, at: Cfg| {
            let index = offset.checked_sub(at as u16).filter(|index| *index < 2)?;
            Some(value.to_le_bytes()[usize::from(index)])
        };
        field(self.id.vendor_id, Cfg::VendorId)
            .or_else(|| field(self.id.device_id, Cfg::DeviceId))
            .or_else(|| field(self.id.subsystem_vendor_id, Cfg::SubsystemVendorId))
            .or_else(|| field(self.id.subsystem_id, Cfg::SubsystemId))
            .unwrap_or(0)
    }

    fn resource(&self, bar: u8) -> Option<BarInfo> {
        self.bars.get(bar as usize).copied().flatten()
    }
}

/// The simulated host.
pub(crate) struct MockHost {
    state: Arc<Mutex<HostState>>,
    devices: Mutex<Vec<Arc<MockPciDevice>>>,
    driver: Mutex<Option<Arc<dyn PciDriver>>>,
    bound: Mutex<BTreeSet<PciDeviceLocation>>,
}

impl MockHost {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(HostState::new())),
            devices: Mutex::new(Vec::new()),
            driver: Mutex::new(None),
            bound: Mutex::new(BTreeSet::new()),
        })
    }

    pub(crate) fn services(self: &Arc<Self>) -> HostServices {
        HostServices {
            bus: self.clone(),
            mapper: self.clone(),
            msix: self.clone(),
            chrdev: self.clone(),
        }
    }

    /// Plugs a function into the bus without probing it.
    pub(crate) fn add_device(&self, builder: MockPciDeviceBuilder) -> Arc<MockPciDevice> {
        if let Some(bar0) = builder.bars[0] {
            self.state
                .lock()
                .ivpositions
                .insert(bar0.base, builder.ivposition);
        }
        let device = Arc::new(MockPciDevice {
            location: builder.location,
            id: builder.id,
            revision: builder.revision,
            bars: builder.bars,
            host: self.state.clone(),
        });
        self.devices.lock().push(device.clone());
        device
    }

    /// Plugs a function into the bus and probes it with the registered driver.
    pub(crate) fn hotplug(&self, builder: MockPciDeviceBuilder) -> (Arc<MockPciDevice>, Result<()>) {
        let device = self.add_device(builder);
        let result = self.probe(&device);
        (device, result)
    }

    /// Removes a function from the bus, detaching it from its driver first.
    pub(crate) fn unplug(&self, location: PciDeviceLocation) {
        let device = {
            let mut devices = self.devices.lock();
            let Some(pos) = devices.iter().position(|d| d.location == location) else {
                return;
            };
            devices.remove(pos)
        };
        let Some(driver) = self.driver.lock().clone() else {
            return;
        };
        if self.bound.lock().remove(&location) {
            let device: Arc<dyn PciDevice> = device;
            driver.remove(&device);
        }
    }

    fn probe(&self, device: &Arc<MockPciDevice>) -> Result<()> {
        let Some(driver) = self.driver.lock().clone() else {
            return Err(Error::DeviceNotMatch);
        };
        if !driver.matches(&**device) {
            return Err(Error::DeviceNotMatch);
        }
        driver.probe(device.clone())?;
        self.bound.lock().insert(device.location);
        Ok(())
    }

    pub(crate) fn arm(&self, failure: Failure) {
        self.state.lock().armed.push(failure);
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    pub(crate) fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    pub(crate) fn bound(&self) -> Vec<PciDeviceLocation> {
        self.bound.lock().iter().copied().collect()
    }

    pub(crate) fn live_mappings(&self) -> usize {
        self.state.lock().mappings.len()
    }

    pub(crate) fn live_vectors(&self) -> usize {
        self.state.lock().vectors.len()
    }

    pub(crate) fn live_cdevs(&self) -> usize {
        self.state.lock().cdevs.len()
    }

    pub(crate) fn node_names(&self) -> Vec<String> {
        self.state.lock().nodes.values().cloned().collect()
    }

    /// Returns whether no per-device resource is held.
    pub(crate) fn no_device_resources(&self) -> bool {
        let state = self.state.lock();
        state.enabled.is_empty()
            && state.regions.is_empty()
            && state.mappings.is_empty()
            && state.vectors.is_empty()
            && state.cdevs.is_empty()
            && state.nodes.is_empty()
    }

    /// Returns whether no resource at all is held.
    pub(crate) fn is_quiescent(&self) -> bool {
        self.no_device_resources() && {
            let state = self.state.lock();
            state.classes.is_empty() && state.chrdev_regions.is_empty()
        }
    }

    /// Dispatches an `open` on the node of `id`, as a userspace `open(2)` would.
    pub(crate) fn open_node(&self, id: DeviceId) -> core::result::Result<(), Errno> {
        let fops = {
            let state = self.state.lock();
            if !state.nodes.contains_key(&id) {
                return Err(Errno::NotFound);
            }
            state
                .cdevs
                .values()
                .find(|cdev| cdev.id == id)
                .map(|cdev| cdev.fops.clone())
                .ok_or(Errno::NoDevice)?
        };
        fops.open(id.minor())
    }
}

impl PciBus for MockHost {
    fn register_driver(&self, driver: Arc<dyn PciDriver>) -> core::result::Result<(), Errno> {
        {
            let mut state = self.state.lock();
            if state.take_failure(Failure::RegisterDriver) {
                return Err(Errno::Exists);
            }
            state.events.push(Event::RegisterDriver {
                name: driver.name().to_string(),
            });
        }
        *self.driver.lock() = Some(driver);

        let devices = self.devices.lock().clone();
        for device in devices.iter() {
            // A failed probe leaves the function unbound.
            let _ = self.probe(device);
        }
        Ok(())
    }

    fn unregister_driver(&self, driver: &Arc<dyn PciDriver>) {
        self.state.lock().events.push(Event::UnregisterDriver {
            name: driver.name().to_string(),
        });
        let Some(registered) = self.driver.lock().take() else {
            return;
        };

        let bound: Vec<PciDeviceLocation> = core::mem::take(&mut *self.bound.lock())
            .into_iter()
            .collect();
        let devices = self.devices.lock().clone();
        for location in bound {
            if let Some(device) = devices.iter().find(|d| d.location == location) {
                let device: Arc<dyn PciDevice> = device.clone();
                registered.remove(&device);
            }
        }
    }
}

impl IoMapper for MockHost {
    fn ioremap(&self, phys: u64, len: usize) -> Option<Arc<dyn IoMem>> {
        let mut state = self.state.lock();
        if state.take_failure(Failure::Ioremap { phys }) {
            return None;
        }
        let mapped_len = if state.take_failure(Failure::ShortIoremap { phys }) {
            len / 2
        } else {
            len
        };

        let base = state.next_virt;
        state.next_virt += mapped_len.max(4096);
        let mut data = alloc::vec![0u8; mapped_len];
        if let Some(ivposition) = state.ivpositions.get(&phys) {
            let offset = Register::IvPosition.offset();
            if offset + 4 <= mapped_len {
                data[offset..offset + 4].copy_from_slice(&ivposition.to_le_bytes());
            }
        }

        state.mappings.insert(base, Mapping { phys });
        state.events.push(Event::Ioremap {
            phys,
            len: mapped_len,
        });
        Some(Arc::new(MockIoMem {
            base,
            data: Mutex::new(data),
        }))
    }

    fn iounmap(&self, mem: Arc<dyn IoMem>) {
        let mut state = self.state.lock();
        let Some(mapping) = state.mappings.remove(&mem.base()) else {
            panic!("unmapping {:#x}, which is not mapped", mem.base());
        };
        state.events.push(Event::Iounmap {
            phys: mapping.phys,
        });
    }
}

impl MsixController for MockHost {
    fn request_vector(
        &self,
        _location: PciDeviceLocation,
        entry: u16,
        name: &str,
    ) -> core::result::Result<u32, Errno> {
        let mut state = self.state.lock();
        if state.take_failure(Failure::RequestVector { entry }) {
            return Err(Errno::NoSpace);
        }
        let irq = state.next_irq;
        state.next_irq += 1;
        state.vectors.insert(irq, entry);
        state.events.push(Event::RequestVector {
            entry,
            irq,
            name: name.to_string(),
        });
        Ok(irq)
    }

    fn free_vector(&self, _location: PciDeviceLocation, irq: u32) {
        let mut state = self.state.lock();
        let Some(entry) = state.vectors.remove(&irq) else {
            panic!("freeing IRQ {}, which is not allocated", irq);
        };
        state.events.push(Event::FreeVector { entry, irq });
    }
}

impl CharDeviceSubsystem for MockHost {
    fn alloc_chrdev_region(
        &self,
        first_minor: MinorId,
        count: u32,
        _name: &str,
    ) -> core::result::Result<DeviceId, Errno> {
        let mut state = self.state.lock();
        if state.take_failure(Failure::AllocChrdevRegion) {
            return Err(Errno::NoSpace);
        }
        let first = DeviceId::new(MajorId::new(state.next_major), first_minor);
        state.next_major -= 1;
        state.chrdev_regions.insert(first, count);
        state.events.push(Event::AllocChrdevRegion { first, count });
        Ok(first)
    }

    fn unregister_chrdev_region(&self, first: DeviceId, count: u32) {
        let mut state = self.state.lock();
        assert_eq!(state.chrdev_regions.remove(&first), Some(count));
        state
            .events
            .push(Event::UnregisterChrdevRegion { first, count });
    }

    fn class_create(&self, name: &str) -> core::result::Result<ClassHandle, Errno> {
        let mut state = self.state.lock();
        if state.take_failure(Failure::ClassCreate) {
            return Err(Errno::NoMemory);
        }
        let class = state.next_class;
        state.next_class += 1;
        state.classes.insert(class);
        state.events.push(Event::ClassCreate {
            name: name.to_string(),
        });
        Ok(ClassHandle::new(class))
    }

    fn class_destroy(&self, class: ClassHandle) {
        let mut state = self.state.lock();
        assert!(state.nodes.is_empty(), "class destroyed with live nodes");
        assert!(state.classes.remove(&class.get()), "unknown class");
        state.events.push(Event::ClassDestroy);
    }

    fn cdev_add(
        &self,
        id: DeviceId,
        _count: u32,
        fops: Arc<dyn FileOperations>,
    ) -> core::result::Result<CdevHandle, Errno> {
        let mut state = self.state.lock();
        if state.take_failure(Failure::CdevAdd) {
            return Err(Errno::Busy);
        }
        let cdev = state.next_cdev;
        state.next_cdev += 1;
        state.cdevs.insert(cdev, Cdev { id, fops });
        state.events.push(Event::CdevAdd { id });
        Ok(CdevHandle::new(cdev))
    }

    fn cdev_del(&self, cdev: CdevHandle) {
        let mut state = self.state.lock();
        let Some(Cdev { id, .. }) = state.cdevs.remove(&cdev.get()) else {
            panic!("deleting unknown cdev {:?}", cdev);
        };
        assert!(
            !state.nodes.contains_key(&id),
            "cdev deleted while its node is reachable"
        );
        state.events.push(Event::CdevDel { id });
    }

    fn device_create(
        &self,
        class: ClassHandle,
        id: DeviceId,
        name: &str,
    ) -> core::result::Result<(), Errno> {
        let mut state = self.state.lock();
        assert!(state.classes.contains(&class.get()), "unknown class");
        if state.take_failure(Failure::DeviceCreate) {
            return Err(Errno::NoMemory);
        }
        assert!(
            state.nodes.insert(id, name.to_string()).is_none(),
            "node created twice"
        );
        state.events.push(Event::DeviceCreate {
            id,
            name: name.to_string(),
        });
        Ok(())
    }

    fn device_destroy(&self, class: ClassHandle, id: DeviceId) {
        let mut state = self.state.lock();
        assert!(state.classes.contains(&class.get()), "unknown class");
        assert!(state.nodes.remove(&id).is_some(), "destroying unknown node");
        state.events.push(Event::DeviceDestroy { id });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_space_identifies_the_function() {
        let host = MockHost::new();
        let device = host.add_device(MockPciDevice::builder().revision(1));
        let read = |field: PciDeviceCommonCfgOffset| device.read_config_u8(field as u16);

        assert_eq!(read(PciDeviceCommonCfgOffset::VendorId), 0x34);
        assert_eq!(device.read_config_u8(0x01), 0x12);
        assert_eq!(read(PciDeviceCommonCfgOffset::DeviceId), 0xe8);
        assert_eq!(read(PciDeviceCommonCfgOffset::RevisionId), 1);
        assert_eq!(read(PciDeviceCommonCfgOffset::SubsystemVendorId), 0xf4);
        assert_eq!(read(PciDeviceCommonCfgOffset::SubsystemId), 0x00);
        assert_eq!(device.read_config_u8(0x2f), 0x11);
    }
}
