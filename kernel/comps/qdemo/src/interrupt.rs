// SPDX-License-Identifier: MPL-2.0

//! Provisioning the MSI-X vectors of a device.

use device_id::MinorId;

use crate::{
    pci::{MsixController, PciDevice, PciDeviceLocation},
    prelude::*,
};

/// The longest vector name the host accepts, excluding the terminator.
pub const MAX_VECTOR_NAME_LEN: usize = 255;

/// One granted MSI-X vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsixVector {
    /// The index into the MSI-X table of the device.
    pub entry: u16,
    /// The interrupt line backing the entry.
    pub irq: u32,
    /// The name the line is registered under.
    pub name: String,
}

/// The MSI-X vectors granted to one device.
#[derive(Debug, Default)]
pub struct MsixVectors {
    location: Option<PciDeviceLocation>,
    vectors: Vec<MsixVector>,
}

impl MsixVectors {
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MsixVector> {
        self.vectors.iter()
    }

    /// Frees every held vector, last granted first.
    ///
    /// Does nothing if no vectors are held.
    pub fn release(&mut self, msix: &dyn MsixController) {
        let Some(location) = self.location.take() else {
            return;
        };
        while let Some(vector) = self.vectors.pop() {
            debug!("{}: freeing MSI-X vector {}", location, vector.name);
            msix.free_vector(location, vector.irq);
        }
    }
}

/// Formats the name of MSI-X entry `entry` of the device with minor `minor`.
pub fn vector_name(minor: MinorId, entry: u16) -> String {
    format!("{}{}-msix{}", DRIVER_NAME, minor.get(), entry)
}

/// Requests `count` MSI-X vectors for `device`.
///
/// Either all `count` vectors are granted or none are held on return.
pub fn request_vectors(
    device: &dyn PciDevice,
    msix: &dyn MsixController,
    minor: MinorId,
    count: u16,
) -> Result<MsixVectors> {
    let location = device.location();
    let mut granted = MsixVectors {
        location: Some(location),
        vectors: Vec::with_capacity(count as usize),
    };

    for entry in 0..count {
        let name = vector_name(minor, entry);
        if name.len() > MAX_VECTOR_NAME_LEN {
            error!("{}: MSI-X vector name too long: {}", location, name);
            granted.release(msix);
            return Err(Error::InterruptProvisioningFailed(Errno::InvalidArgs));
        }

        match msix.request_vector(location, entry, &name) {
            Ok(irq) => granted.vectors.push(MsixVector { entry, irq, name }),
            Err(errno) => {
                error!(
                    "{}: unable to request MSI-X vector {}: {}",
                    location, entry, errno
                );
                granted.release(msix);
                return Err(Error::InterruptProvisioningFailed(errno));
            }
        }
    }

    Ok(granted)
}

/// Frees the vectors held by `vectors`. Safe to call when none are held.
pub fn release_vectors(msix: &dyn MsixController, vectors: &mut MsixVectors) {
    vectors.release(msix);
}
