// SPDX-License-Identifier: MPL-2.0

use device_id::MinorId;

use crate::prelude::*;

/// The reference point of [`FileOperations::llseek`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekWhence {
    Set,
    Cur,
    End,
}

/// The handler set the host dispatches userspace calls on a device node to.
///
/// Every call names the minor number of the node it was made on.
pub trait FileOperations: Send + Sync + Debug {
    fn open(&self, minor: MinorId) -> core::result::Result<(), Errno>;

    fn release(&self, minor: MinorId) -> core::result::Result<(), Errno>;

    fn read(
        &self,
        minor: MinorId,
        buf: &mut [u8],
        offset: u64,
    ) -> core::result::Result<usize, Errno>;

    fn write(&self, minor: MinorId, buf: &[u8], offset: u64) -> core::result::Result<usize, Errno>;

    fn llseek(
        &self,
        minor: MinorId,
        offset: i64,
        whence: SeekWhence,
    ) -> core::result::Result<u64, Errno>;

    /// Maps `len` bytes of the device starting at `offset`, returning the user address.
    fn mmap(&self, minor: MinorId, offset: u64, len: usize) -> core::result::Result<usize, Errno>;

    fn ioctl(&self, minor: MinorId, cmd: u32, arg: usize) -> core::result::Result<i32, Errno>;
}

/// The handler set of qdemo nodes.
///
/// The node exists so that the device has a stable name and device number;
/// none of the userspace entry points are implemented yet.
#[derive(Debug, Default)]
pub struct QdemoFileOps;

impl QdemoFileOps {
    fn unsupported<T>(op: &str, minor: MinorId) -> core::result::Result<T, Errno> {
        debug!("{}{}: {} is not supported", DRIVER_NAME, minor.get(), op);
        Err(Errno::NotSupported)
    }
}

impl FileOperations for QdemoFileOps {
    fn open(&self, minor: MinorId) -> core::result::Result<(), Errno> {
        Self::unsupported("open", minor)
    }

    fn release(&self, minor: MinorId) -> core::result::Result<(), Errno> {
        Self::unsupported("release", minor)
    }

    fn read(
        &self,
        minor: MinorId,
        _buf: &mut [u8],
        _offset: u64,
    ) -> core::result::Result<usize, Errno> {
        Self::unsupported("read", minor)
    }

    fn write(
        &self,
        minor: MinorId,
        _buf: &[u8],
        _offset: u64,
    ) -> core::result::Result<usize, Errno> {
        Self::unsupported("write", minor)
    }

    fn llseek(
        &self,
        minor: MinorId,
        _offset: i64,
        _whence: SeekWhence,
    ) -> core::result::Result<u64, Errno> {
        Self::unsupported("llseek", minor)
    }

    fn mmap(
        &self,
        minor: MinorId,
        _offset: u64,
        _len: usize,
    ) -> core::result::Result<usize, Errno> {
        Self::unsupported("mmap", minor)
    }

    fn ioctl(&self, minor: MinorId, _cmd: u32, _arg: usize) -> core::result::Result<i32, Errno> {
        Self::unsupported("ioctl", minor)
    }
}
