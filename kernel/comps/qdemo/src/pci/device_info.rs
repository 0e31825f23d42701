// SPDX-License-Identifier: MPL-2.0

use core::fmt;

/// The wildcard used by match table entries.
pub const PCI_ANY_ID: u16 = 0xffff;

/// The identity fields read from the configuration space header of a PCI function.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PciDeviceId {
    pub vendor_id: u16,
    pub device_id: u16,
    pub subsystem_vendor_id: u16,
    pub subsystem_id: u16,
}

/// The location of a PCI function: segment, bus, device and function number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PciDeviceLocation {
    pub segment: u16,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciDeviceLocation {
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self {
            segment: 0,
            bus,
            device,
            function,
        }
    }
}

/// Formats the location the way Linux names PCI functions, e.g., `0000:00:04.0`.
impl fmt::Display for PciDeviceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.segment, self.bus, self.device, self.function
        )
    }
}

/// One entry of a driver's match table.
///
/// Each field either equals the corresponding field of [`PciDeviceId`] or is [`PCI_ANY_ID`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PciDeviceMatch {
    pub vendor_id: u16,
    pub device_id: u16,
    pub subsystem_vendor_id: u16,
    pub subsystem_id: u16,
}

impl PciDeviceMatch {
    /// Matches one vendor/device pair with any subsystem.
    pub const fn device(vendor_id: u16, device_id: u16) -> Self {
        Self {
            vendor_id,
            device_id,
            subsystem_vendor_id: PCI_ANY_ID,
            subsystem_id: PCI_ANY_ID,
        }
    }

    pub fn matches(&self, id: &PciDeviceId) -> bool {
        fn field(wanted: u16, actual: u16) -> bool {
            wanted == PCI_ANY_ID || wanted == actual
        }

        field(self.vendor_id, id.vendor_id)
            && field(self.device_id, id.device_id)
            && field(self.subsystem_vendor_id, id.subsystem_vendor_id)
            && field(self.subsystem_id, id.subsystem_id)
    }
}
