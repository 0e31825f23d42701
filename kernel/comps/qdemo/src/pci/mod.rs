// SPDX-License-Identifier: MPL-2.0

//! PCI bus abstractions consumed by the driver.
//!
//! Users implement [`PciDriver`] and register it with a [`PciBus`]. When a
//! function in the bus matches the driver's table, the bus calls the driver's
//! `probe` with a [`PciDevice`] handle that borrows the function's
//! configuration space and resources.

pub mod bus;
pub mod cfg_space;
pub mod device_info;
pub mod msix;

pub use self::{
    bus::{PciBus, PciDevice, PciDriver},
    cfg_space::{BarFlags, BarInfo, NUM_BARS, PciDeviceCommonCfgOffset},
    device_info::{PCI_ANY_ID, PciDeviceId, PciDeviceLocation, PciDeviceMatch},
    msix::MsixController,
};
