// SPDX-License-Identifier: MPL-2.0

use core::fmt;

/// The error codes reported by host subsystems.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Errno {
    /// No such device.
    NoDevice,
    /// Device or resource busy.
    Busy,
    /// Out of memory.
    NoMemory,
    /// No space left, e.g., no free major numbers or interrupt vectors.
    NoSpace,
    /// Invalid arguments.
    InvalidArgs,
    /// I/O error.
    IoFailed,
    /// The object already exists.
    Exists,
    /// The object does not exist.
    NotFound,
    /// The operation is not supported.
    NotSupported,
}

impl Errno {
    /// Returns the negative Linux status value of this error code.
    pub const fn status(&self) -> i32 {
        match self {
            Errno::NoDevice => -19,
            Errno::Busy => -16,
            Errno::NoMemory => -12,
            Errno::NoSpace => -28,
            Errno::InvalidArgs => -22,
            Errno::IoFailed => -5,
            Errno::Exists => -17,
            Errno::NotFound => -2,
            Errno::NotSupported => -95,
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The error type of the qdemo driver.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Error {
    /// The bus device could not be enabled.
    EnableFailed(Errno),
    /// The I/O and memory regions of the device could not be reserved.
    RegionReservationFailed(Errno),
    /// The BAR is absent, empty or not a memory BAR.
    BarNotPresent(u8),
    /// The BAR could not be mapped into the kernel address space.
    MappingFailed { bar: u8, size: usize },
    /// The character device or its node could not be created.
    NodePublishFailed(Errno),
    /// The MSI-X vectors could not be granted or named.
    InterruptProvisioningFailed(Errno),
    /// The device is not in the match table.
    DeviceNotMatch,
    /// All device slots of the driver are in use.
    DeviceBusy,
    /// The device is not bound to this driver.
    DeviceNotFound,
    /// No major number or minor range could be reserved.
    MajorAllocationFailed(Errno),
    /// The device class could not be created.
    ClassCreationFailed(Errno),
    /// The driver could not be registered with the PCI bus.
    DriverRegistrationFailed(Errno),
    /// The driver configuration is invalid.
    InvalidConfig,
}

impl Error {
    /// Returns the negative status reported to the PCI bus or to the module loader.
    pub const fn status(&self) -> i32 {
        match self {
            Error::EnableFailed(errno)
            | Error::RegionReservationFailed(errno)
            | Error::NodePublishFailed(errno)
            | Error::InterruptProvisioningFailed(errno)
            | Error::MajorAllocationFailed(errno)
            | Error::ClassCreationFailed(errno)
            | Error::DriverRegistrationFailed(errno) => errno.status(),
            Error::BarNotPresent(_) => Errno::NoDevice.status(),
            Error::MappingFailed { .. } => Errno::NoMemory.status(),
            Error::DeviceNotMatch => Errno::NoDevice.status(),
            Error::DeviceBusy => Errno::Busy.status(),
            Error::DeviceNotFound => Errno::NotFound.status(),
            Error::InvalidConfig => Errno::InvalidArgs.status(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EnableFailed(errno) => write!(f, "unable to enable device: {}", errno),
            Error::RegionReservationFailed(errno) => {
                write!(f, "unable to reserve resources: {}", errno)
            }
            Error::BarNotPresent(bar) => write!(f, "BAR{} is not a present memory BAR", bar),
            Error::MappingFailed { bar, size } => {
                write!(f, "unable to ioremap bar{}, size: {}", bar, size)
            }
            Error::NodePublishFailed(errno) => {
                write!(f, "unable to publish device node: {}", errno)
            }
            Error::InterruptProvisioningFailed(errno) => {
                write!(f, "unable to request MSI-X vectors: {}", errno)
            }
            Error::DeviceNotMatch => write!(f, "device does not match"),
            Error::DeviceBusy => write!(f, "no free device slot"),
            Error::DeviceNotFound => write!(f, "device is not bound"),
            Error::MajorAllocationFailed(errno) => {
                write!(f, "unable to allocate major number: {}", errno)
            }
            Error::ClassCreationFailed(errno) => {
                write!(f, "unable to create the device class: {}", errno)
            }
            Error::DriverRegistrationFailed(errno) => {
                write!(f, "unable to register driver: {}", errno)
            }
            Error::InvalidConfig => write!(f, "invalid driver configuration"),
        }
    }
}
