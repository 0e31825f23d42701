// SPDX-License-Identifier: MPL-2.0

//! The contract between PCI drivers and the host PCI bus.
//!
//! The host owns enumeration. It hands each function it finds to the
//! [`PciDriver`]s whose match table accepts it, and calls [`PciDriver::remove`]
//! when the function goes away or the driver is unregistered. `remove` is only
//! called for functions whose `probe` succeeded.

use super::{
    cfg_space::BarInfo,
    device_info::{PciDeviceId, PciDeviceLocation, PciDeviceMatch},
};
use crate::prelude::*;

/// A PCI function as seen by the driver that probes it.
pub trait PciDevice: Send + Sync + Debug {
    /// Returns the location of the function.
    fn location(&self) -> PciDeviceLocation;

    /// Returns the identity fields of the configuration space header.
    fn device_id(&self) -> PciDeviceId;

    /// Wakes the function up and enables its memory and I/O decoding.
    fn enable(&self) -> core::result::Result<(), Errno>;

    /// Reverts [`PciDevice::enable`].
    fn disable(&self);

    /// Marks all BARs of the function as owned by `owner`.
    fn request_regions(&self, owner: &str) -> core::result::Result<(), Errno>;

    /// Reverts [`PciDevice::request_regions`].
    fn release_regions(&self);

    /// Reads one byte of the configuration space.
    fn read_config_u8(&self, offset: u16) -> u8;

    /// Returns the resource behind a BAR, or `None` if the BAR is unimplemented.
    fn resource(&self, bar: u8) -> Option<BarInfo>;
}

/// A driver for PCI functions.
pub trait PciDriver: Send + Sync + Debug {
    /// The name under which the driver registers and reserves regions.
    fn name(&self) -> &str;

    /// The functions this driver is willing to probe.
    fn id_table(&self) -> &[PciDeviceMatch];

    /// Attaches to a function. On error the function stays unbound.
    fn probe(&self, device: Arc<dyn PciDevice>) -> Result<()>;

    /// Detaches from a function that was successfully probed.
    fn remove(&self, device: &Arc<dyn PciDevice>);

    /// Returns whether the match table accepts `device`.
    fn matches(&self, device: &dyn PciDevice) -> bool {
        let id = device.device_id();
        self.id_table().iter().any(|entry| entry.matches(&id))
    }
}

/// The host PCI bus.
pub trait PciBus: Send + Sync {
    /// Registers a driver and probes every present function it matches.
    fn register_driver(&self, driver: Arc<dyn PciDriver>) -> core::result::Result<(), Errno>;

    /// Unregisters a driver.
    ///
    /// Once this returns no new `probe` of the driver can start, and
    /// `remove` has been called for every function bound to it.
    fn unregister_driver(&self, driver: &Arc<dyn PciDriver>);
}
