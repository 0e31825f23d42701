// SPDX-License-Identifier: MPL-2.0

//! Character and block device numbers.
//!
//! A device number is a pair of a **major** number, which names a driver (or a family of
//! devices served by one driver), and a **minor** number, which names one device instance
//! within that family. Drivers reserve a contiguous range of minor numbers under one major
//! number and hand out the minors to the devices they attach.
//!
//! The packing used by [`DeviceId::to_raw`] follows the in-kernel `dev_t` of Linux
//! (`MKDEV`): 12 bits of major number above 20 bits of minor number.
//! See <https://github.com/torvalds/linux/blob/v6.13/include/linux/kdev_t.h#L7-L12>.

#![no_std]
#![deny(unsafe_code)]

use core::fmt;

/// The number of bits used by the minor number in the raw encoding.
pub const MINOR_BITS: u32 = 20;

/// The largest valid minor number.
pub const MAX_MINOR: u32 = (1 << MINOR_BITS) - 1;

/// The largest valid major number.
pub const MAX_MAJOR: u16 = (1 << (32 - MINOR_BITS)) - 1;

/// A major device number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MajorId(u16);

impl MajorId {
    /// Creates a major ID.
    ///
    /// # Panics
    ///
    /// Panics if `major` is greater than [`MAX_MAJOR`].
    pub const fn new(major: u16) -> Self {
        assert!(major <= MAX_MAJOR);
        Self(major)
    }

    /// Returns the raw value.
    pub const fn get(&self) -> u16 {
        self.0
    }
}

/// A minor device number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinorId(u32);

impl MinorId {
    /// Creates a minor ID.
    ///
    /// # Panics
    ///
    /// Panics if `minor` is greater than [`MAX_MINOR`].
    pub const fn new(minor: u32) -> Self {
        assert!(minor <= MAX_MINOR);
        Self(minor)
    }

    /// Returns the raw value.
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the minor ID that is `offset` places after this one,
    /// or `None` if it would exceed [`MAX_MINOR`].
    pub fn checked_add(&self, offset: u32) -> Option<Self> {
        let minor = self.0.checked_add(offset)?;
        (minor <= MAX_MINOR).then_some(Self(minor))
    }
}

/// A device ID, containing a major device number and a minor device number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId {
    major: MajorId,
    minor: MinorId,
}

impl DeviceId {
    /// Creates a device ID from the major device number and the minor device number.
    pub const fn new(major: MajorId, minor: MinorId) -> Self {
        Self { major, minor }
    }

    /// Returns the major device number.
    pub const fn major(&self) -> MajorId {
        self.major
    }

    /// Returns the minor device number.
    pub const fn minor(&self) -> MinorId {
        self.minor
    }

    /// Returns the device ID with the same major number and another minor number.
    pub const fn with_minor(&self, minor: MinorId) -> Self {
        Self::new(self.major, minor)
    }

    /// Packs the device ID into the in-kernel `dev_t` layout.
    pub const fn to_raw(&self) -> u32 {
        ((self.major.get() as u32) << MINOR_BITS) | self.minor.get()
    }

    /// Unpacks a device ID from the in-kernel `dev_t` layout.
    pub const fn from_raw(raw: u32) -> Self {
        Self::new(
            MajorId((raw >> MINOR_BITS) as u16),
            MinorId(raw & MAX_MINOR),
        )
    }

    /// Encodes the device ID as the `u64` value userspace sees in `stat`.
    ///
    /// The lower 32 bits use the same encoding as `new_encode_dev` in Linux, and the higher
    /// bits follow the `makedev` implementation of glibc:
    /// <https://github.com/bminor/glibc/blob/632d895f3e5d98162f77b9c3c1da4ec19968b671/bits/sysmacros.h#L26-L34>.
    pub fn as_encoded_u64(&self) -> u64 {
        let major = self.major.get() as u64;
        let minor = self.minor.get() as u64;
        ((major & 0xffff_f000) << 32)
            | ((major & 0x0000_0fff) << 8)
            | ((minor & 0xffff_ff00) << 12)
            | (minor & 0x0000_00ff)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major.get(), self.minor.get())
    }
}
