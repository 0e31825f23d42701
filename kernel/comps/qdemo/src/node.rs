// SPDX-License-Identifier: MPL-2.0

//! Publishing devices as character device nodes.

use device_id::{DeviceId, MinorId};

use crate::{
    chrdev::{CdevHandle, CharDeviceSubsystem, ClassHandle, FileOperations},
    prelude::*,
};

/// The driver-wide character device identity: a reserved range of device
/// numbers, the class grouping the nodes, and the handler set bound to them.
///
/// Created once at module load and destroyed once at module unload.
#[derive(Debug)]
pub struct DeviceIdentity {
    first: DeviceId,
    count: u32,
    class: ClassHandle,
    fops: Arc<dyn FileOperations>,
}

impl DeviceIdentity {
    /// The first device number of the range.
    pub fn first(&self) -> DeviceId {
        self.first
    }

    /// The number of minors in the range.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn class(&self) -> ClassHandle {
        self.class
    }

    /// Returns the minors of the range in ascending order.
    pub fn minors(&self) -> impl Iterator<Item = MinorId> + '_ {
        (0..self.count).filter_map(|offset| self.first.minor().checked_add(offset))
    }

    /// Returns the device number of `minor`, if it belongs to the range.
    pub fn device_id(&self, minor: MinorId) -> Option<DeviceId> {
        let first = self.first.minor().get();
        (minor.get() >= first && minor.get() - first < self.count)
            .then(|| self.first.with_minor(minor))
    }
}

/// Reserves a major number with `count` minors and creates the device class.
pub fn register_device_identity(
    chrdev: &dyn CharDeviceSubsystem,
    fops: Arc<dyn FileOperations>,
    count: u32,
) -> Result<DeviceIdentity> {
    let first = chrdev
        .alloc_chrdev_region(MinorId::new(0), count, DRIVER_NAME)
        .map_err(|errno| {
            error!("unable to allocate major number: {}", errno);
            Error::MajorAllocationFailed(errno)
        })?;

    let class = match chrdev.class_create(DRIVER_NAME) {
        Ok(class) => class,
        Err(errno) => {
            error!("unable to create the device class: {}", errno);
            chrdev.unregister_chrdev_region(first, count);
            return Err(Error::ClassCreationFailed(errno));
        }
    };

    info!(
        "major: {}, minor: {}",
        first.major().get(),
        first.minor().get()
    );
    Ok(DeviceIdentity {
        first,
        count,
        class,
        fops,
    })
}

/// Destroys the device class of `identity`.
///
/// The first half of [`unregister_device_identity`]; the device number range
/// stays reserved until [`release_device_numbers`].
pub fn destroy_class(chrdev: &dyn CharDeviceSubsystem, identity: &DeviceIdentity) {
    chrdev.class_destroy(identity.class);
}

/// Releases the device number range of `identity`.
pub fn release_device_numbers(chrdev: &dyn CharDeviceSubsystem, identity: DeviceIdentity) {
    chrdev.unregister_chrdev_region(identity.first, identity.count);
}

/// Destroys the device class and releases the device number range.
pub fn unregister_device_identity(chrdev: &dyn CharDeviceSubsystem, identity: DeviceIdentity) {
    destroy_class(chrdev, &identity);
    release_device_numbers(chrdev, identity);
}

/// The name of the node of the device with minor `minor`.
pub fn node_name(minor: MinorId) -> String {
    format!("{}{}", DRIVER_NAME, minor.get())
}

/// A device node published by [`publish_node`].
#[derive(Debug)]
pub struct PublishedNode {
    id: DeviceId,
    cdev: CdevHandle,
    name: String,
}

impl PublishedNode {
    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Binds the handler set of `identity` to `id` and creates the node of `id`.
///
/// If the node cannot be created, the handler binding is removed again.
pub fn publish_node(
    chrdev: &dyn CharDeviceSubsystem,
    identity: &DeviceIdentity,
    id: DeviceId,
) -> Result<PublishedNode> {
    let cdev = chrdev
        .cdev_add(id, 1, identity.fops.clone())
        .map_err(|errno| {
            error!("unable to add chrdev {} to system: {}", id, errno);
            Error::NodePublishFailed(errno)
        })?;

    let name = node_name(id.minor());
    if let Err(errno) = chrdev.device_create(identity.class, id, &name) {
        error!("unable to create device file: {}: {}", id, errno);
        chrdev.cdev_del(cdev);
        return Err(Error::NodePublishFailed(errno));
    }

    Ok(PublishedNode { id, cdev, name })
}

/// Destroys the node, then removes the handler binding behind it.
pub fn unpublish_node(
    chrdev: &dyn CharDeviceSubsystem,
    identity: &DeviceIdentity,
    node: PublishedNode,
) {
    chrdev.device_destroy(identity.class, node.id);
    chrdev.cdev_del(node.cdev);
}
