// SPDX-License-Identifier: MPL-2.0

//! The contract with the host interrupt subsystem for MSI-X vectors.

use super::device_info::PciDeviceLocation;
use crate::prelude::*;

/// Allocates MSI-X vectors of PCI functions.
///
/// The host owns the bookkeeping of interrupt lines. A driver asks for one
/// table entry at a time and gets back the interrupt line that now backs it.
pub trait MsixController: Send + Sync {
    /// Routes MSI-X table entry `entry` of the function at `location` to a
    /// newly allocated interrupt line named `name`, returning the line number.
    fn request_vector(
        &self,
        location: PciDeviceLocation,
        entry: u16,
        name: &str,
    ) -> core::result::Result<u32, Errno>;

    /// Frees an interrupt line returned by [`MsixController::request_vector`].
    fn free_vector(&self, location: PciDeviceLocation, irq: u32);
}
