// SPDX-License-Identifier: MPL-2.0

use device_id::{DeviceId, MinorId};
use spin::Mutex;

use crate::{
    HostServices,
    config::QdemoConfig,
    device::{ProbeContext, ProbeState, QdemoDevice},
    io_mem::IoMem,
    node::{self, DeviceIdentity},
    pci::{PciDevice, PciDeviceLocation, PciDeviceMatch, PciDriver},
    prelude::*,
};

/// The vendor ID of QEMU emulated devices.
pub const PCI_VENDOR_ID_QEMU: u16 = 0x1234;

/// The device ID of the qdemo device.
pub const QDEMO_DEVICE_ID: u16 = 0x12e8;

const ID_TABLE: [PciDeviceMatch; 1] = [PciDeviceMatch::device(PCI_VENDOR_ID_QEMU, QDEMO_DEVICE_ID)];

/// A snapshot of an active device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub minor: MinorId,
    pub location: PciDeviceLocation,
    pub node_id: DeviceId,
    pub node_name: String,
    pub revision: u8,
    pub ivposition: u32,
    /// The interrupt lines granted to the device, in MSI-X table order.
    pub irqs: Vec<u32>,
}

/// The device table and the character device identity it hands minors out of.
#[derive(Debug)]
struct DriverState {
    identity: Option<DeviceIdentity>,
    devices: Vec<QdemoDevice>,
}

/// The qdemo PCI driver.
///
/// It owns one handle per minor of its device number range. A handle is
/// bound to at most one PCI function at a time; a function that arrives
/// while every handle is bound is refused.
#[derive(Debug)]
pub struct QdemoDriver {
    host: HostServices,
    config: QdemoConfig,
    state: Mutex<DriverState>,
}

impl QdemoDriver {
    pub(crate) fn new(host: HostServices, identity: DeviceIdentity, config: QdemoConfig) -> Self {
        let devices = identity.minors().map(QdemoDevice::new).collect();
        Self {
            host,
            config,
            state: Mutex::new(DriverState {
                identity: Some(identity),
                devices,
            }),
        }
    }

    /// Returns the minors and locations of the bound devices.
    pub fn devices(&self) -> Vec<(MinorId, PciDeviceLocation)> {
        self.state
            .lock()
            .devices
            .iter()
            .filter_map(|device| Some((device.minor(), device.location()?)))
            .collect()
    }

    /// Returns the lifecycle state of the handle owning `minor`.
    pub fn state_of(&self, minor: MinorId) -> Option<ProbeState> {
        self.with_device(minor, QdemoDevice::state)
    }

    /// Returns a snapshot of the active device with `minor`.
    pub fn device_info(&self, minor: MinorId) -> Option<DeviceInfo> {
        self.with_active_device(minor, |device| {
            Some(DeviceInfo {
                minor,
                location: device.location()?,
                node_id: device.node_id()?,
                node_name: device.node_name()?.to_string(),
                revision: device.revision(),
                ivposition: device.ivposition(),
                irqs: device.vectors().iter().map(|vector| vector.irq).collect(),
            })
        })
    }

    /// Returns the shared memory window of the active device with `minor`.
    pub fn shared_memory(&self, minor: MinorId) -> Option<Arc<dyn IoMem>> {
        self.with_active_device(minor, |device| device.shared_memory().cloned())
    }

    /// Returns the register window of the active device with `minor`.
    pub fn registers(&self, minor: MinorId) -> Option<Arc<dyn IoMem>> {
        self.with_active_device(minor, |device| device.registers().cloned())
    }

    fn with_device<T>(&self, minor: MinorId, f: impl FnOnce(&QdemoDevice) -> T) -> Option<T> {
        let state = self.state.lock();
        state
            .devices
            .iter()
            .find(|device| device.minor() == minor)
            .map(f)
    }

    fn with_active_device<T>(
        &self,
        minor: MinorId,
        f: impl FnOnce(&QdemoDevice) -> Option<T>,
    ) -> Option<T> {
        self.with_device(minor, |device| {
            if device.state() == ProbeState::Active {
                f(device)
            } else {
                None
            }
        })
        .flatten()
    }

    /// Releases the driver-wide state after the driver has been unregistered.
    ///
    /// The device class is destroyed first, then the device table is freed,
    /// and the device number range is released last.
    pub(crate) fn shutdown(&self) {
        let mut state = self.state.lock();
        let Some(identity) = state.identity.take() else {
            return;
        };

        let ctx = ProbeContext {
            host: &self.host,
            identity: &identity,
            config: &self.config,
        };
        for device in state.devices.iter_mut() {
            if device.state() != ProbeState::Unbound {
                warn!(
                    "{}{} still bound at shutdown, tearing it down",
                    DRIVER_NAME,
                    device.minor().get()
                );
                device.tear_down(&ctx);
            }
        }

        node::destroy_class(&*self.host.chrdev, &identity);
        state.devices = Vec::new();
        node::release_device_numbers(&*self.host.chrdev, identity);
    }
}

impl PciDriver for QdemoDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn id_table(&self) -> &[PciDeviceMatch] {
        &ID_TABLE
    }

    fn probe(&self, device: Arc<dyn PciDevice>) -> Result<()> {
        let location = device.location();
        info!("{}: probing for device", location);

        if !self.matches(&*device) {
            return Err(Error::DeviceNotMatch);
        }

        let mut state = self.state.lock();
        let DriverState { identity, devices } = &mut *state;
        let Some(identity) = identity.as_ref() else {
            error!("{}: driver is shutting down", location);
            return Err(Error::DeviceBusy);
        };
        if devices
            .iter()
            .any(|handle| handle.location() == Some(location))
        {
            error!("{}: device is already bound", location);
            return Err(Error::DeviceBusy);
        }
        let Some(handle) = devices
            .iter_mut()
            .find(|handle| handle.state() == ProbeState::Unbound)
        else {
            error!(
                "{}: all {} device slots are in use",
                location, self.config.max_devices
            );
            return Err(Error::DeviceBusy);
        };

        let ctx = ProbeContext {
            host: &self.host,
            identity,
            config: &self.config,
        };
        handle.bring_up(device, &ctx)?;

        info!("{}: device probed", location);
        Ok(())
    }

    fn remove(&self, device: &Arc<dyn PciDevice>) {
        let location = device.location();
        info!("{}: removing device", location);

        let mut state = self.state.lock();
        let DriverState { identity, devices } = &mut *state;
        let Some(identity) = identity.as_ref() else {
            warn!("{}: driver already shut down", location);
            return;
        };
        let Some(handle) = devices
            .iter_mut()
            .find(|handle| handle.location() == Some(location))
        else {
            warn!("{}: device is not bound to this driver", location);
            return;
        };

        let ctx = ProbeContext {
            host: &self.host,
            identity,
            config: &self.config,
        };
        handle.tear_down(&ctx);
    }
}
