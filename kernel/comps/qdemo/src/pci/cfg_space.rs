// SPDX-License-Identifier: MPL-2.0

//! The parts of the PCI configuration space used by this driver.

use bitflags::bitflags;

/// Offsets of the identification fields of a type 0 configuration space header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PciDeviceCommonCfgOffset {
    VendorId = 0x00,
    DeviceId = 0x02,
    RevisionId = 0x08,
    SubsystemVendorId = 0x2C,
    SubsystemId = 0x2E,
}

/// The number of BARs of a type 0 header.
pub const NUM_BARS: u8 = 6;

bitflags! {
    /// Resource flags of a BAR, as decoded by the host when it enumerated the device.
    pub struct BarFlags: u32 {
        /// The BAR decodes I/O port space.
        const IO = 1 << 0;
        /// The BAR decodes memory space.
        const MEMORY = 1 << 1;
        /// The memory is prefetchable.
        const PREFETCHABLE = 1 << 2;
        /// The BAR is the low half of a 64-bit memory BAR.
        const MEM_64 = 1 << 3;
    }
}

/// The physical resource described by one BAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarInfo {
    pub base: u64,
    pub len: u64,
    pub flags: BarFlags,
}

impl BarInfo {
    /// Creates a memory BAR description.
    pub const fn memory(base: u64, len: u64) -> Self {
        Self {
            base,
            len,
            flags: BarFlags::MEMORY,
        }
    }

    /// Returns whether the BAR can be mapped with `ioremap`.
    pub fn is_mappable(&self) -> bool {
        self.len != 0 && self.flags.contains(BarFlags::MEMORY) && !self.flags.contains(BarFlags::IO)
    }
}
