// SPDX-License-Identifier: MPL-2.0

//! The contract with the host character device subsystem.
//!
//! A driver reserves a range of device numbers once, creates a device class
//! that groups its nodes, and then for every device it attaches binds a
//! [`FileOperations`] handler set to a device number and creates the node
//! userspace opens.

mod file_ops;

use device_id::{DeviceId, MinorId};

pub use self::file_ops::{FileOperations, QdemoFileOps, SeekWhence};
use crate::prelude::*;

/// A device class created by [`CharDeviceSubsystem::class_create`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassHandle(u64);

impl ClassHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// A handler binding created by [`CharDeviceSubsystem::cdev_add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CdevHandle(u64);

impl CdevHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// The host character device subsystem.
pub trait CharDeviceSubsystem: Send + Sync {
    /// Reserves a dynamically allocated major number together with `count`
    /// minors starting at `first_minor`. Returns the first device number.
    fn alloc_chrdev_region(
        &self,
        first_minor: MinorId,
        count: u32,
        name: &str,
    ) -> core::result::Result<DeviceId, Errno>;

    /// Releases a range reserved by [`CharDeviceSubsystem::alloc_chrdev_region`].
    fn unregister_chrdev_region(&self, first: DeviceId, count: u32);

    /// Creates a device class.
    fn class_create(&self, name: &str) -> core::result::Result<ClassHandle, Errno>;

    /// Destroys a device class. All of its nodes must have been destroyed.
    fn class_destroy(&self, class: ClassHandle);

    /// Binds `fops` to `count` device numbers starting at `id`.
    ///
    /// From this point the host may dispatch calls on the device number to `fops`.
    fn cdev_add(
        &self,
        id: DeviceId,
        count: u32,
        fops: Arc<dyn FileOperations>,
    ) -> core::result::Result<CdevHandle, Errno>;

    /// Removes a binding created by [`CharDeviceSubsystem::cdev_add`].
    fn cdev_del(&self, cdev: CdevHandle);

    /// Creates the filesystem node `name` for `id` in `class`.
    fn device_create(
        &self,
        class: ClassHandle,
        id: DeviceId,
        name: &str,
    ) -> core::result::Result<(), Errno>;

    /// Destroys the node of `id` in `class`.
    fn device_destroy(&self, class: ClassHandle, id: DeviceId);
}
