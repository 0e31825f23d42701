// SPDX-License-Identifier: MPL-2.0

//! Memory-mapped I/O windows.

use crate::prelude::*;

/// A range of device memory mapped into the kernel address space.
///
/// All accesses are relative to the start of the window and bounds-checked
/// against [`IoMem::len`].
pub trait IoMem: Send + Sync + Debug {
    /// The virtual address the window starts at.
    fn base(&self) -> usize;

    /// The length of the window in bytes.
    fn len(&self) -> usize;

    /// Reads `buf.len()` bytes starting at `offset`.
    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> core::result::Result<(), Errno>;

    /// Writes `buf` starting at `offset`.
    fn write_bytes(&self, offset: usize, buf: &[u8]) -> core::result::Result<(), Errno>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads a little-endian 32-bit register.
    fn read_u32(&self, offset: usize) -> core::result::Result<u32, Errno> {
        let mut buf = [0u8; 4];
        self.read_bytes(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Writes a little-endian 32-bit register.
    fn write_u32(&self, offset: usize, value: u32) -> core::result::Result<(), Errno> {
        self.write_bytes(offset, &value.to_le_bytes())
    }
}

/// Maps physical device memory into the kernel address space.
pub trait IoMapper: Send + Sync {
    /// Maps `len` bytes at physical address `phys`.
    ///
    /// Returns `None` if the mapping cannot be established, in which case
    /// nothing is left mapped.
    fn ioremap(&self, phys: u64, len: usize) -> Option<Arc<dyn IoMem>>;

    /// Unmaps a window returned by [`IoMapper::ioremap`].
    fn iounmap(&self, mem: Arc<dyn IoMem>);
}

/// Checks that `len` bytes at `offset` fit into a window of `size` bytes.
pub fn check_range(offset: usize, len: usize, size: usize) -> core::result::Result<(), Errno> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Errno::InvalidArgs),
    }
}
