// SPDX-License-Identifier: MPL-2.0

//! The BAR layout and registers of the device.

/// The BAR holding the register block.
pub const REGISTERS_BAR: u8 = 0;

/// The BAR holding the MSI-X table and pending bit array.
pub const MSIX_BAR: u8 = 1;

/// The BAR holding the shared memory.
pub const SHARED_MEMORY_BAR: u8 = 2;

/// The hardware revision that exposes the MSI-X capability.
pub const MSIX_REVISION: u8 = 1;

/// Offsets of the 32-bit registers in the register BAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Register {
    /// Interrupt mask (legacy interrupts only).
    IntrMask = 0x00,
    /// Interrupt status (legacy interrupts only).
    IntrStatus = 0x04,
    /// The ID of this peer. Zero if the device has no peer connection.
    IvPosition = 0x08,
    /// Write `(peer << 16) | vector` to interrupt a peer.
    Doorbell = 0x0c,
}

impl Register {
    pub const fn offset(self) -> usize {
        self as usize
    }
}
