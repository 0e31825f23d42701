// SPDX-License-Identifier: MPL-2.0

use crate::prelude::*;

/// The maximum number of devices the driver attaches at the same time.
pub const MAX_DEVICES: u32 = 1;

/// The number of MSI-X vectors requested from a device with a peer.
pub const MSIX_VECTOR_COUNT: u16 = 4;

/// The compile-time tunables of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QdemoConfig {
    /// The size of the device table and of the minor number range.
    pub max_devices: u32,
    /// The number of MSI-X vectors requested per device.
    pub msix_vectors: u16,
}

impl Default for QdemoConfig {
    fn default() -> Self {
        Self {
            max_devices: MAX_DEVICES,
            msix_vectors: MSIX_VECTOR_COUNT,
        }
    }
}

impl QdemoConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_devices == 0 || self.msix_vectors == 0 {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}
