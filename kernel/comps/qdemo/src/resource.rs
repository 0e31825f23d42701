// SPDX-License-Identifier: MPL-2.0

//! Mapping BARs into the kernel address space.

use crate::{
    io_mem::{IoMapper, IoMem},
    pci::{BarInfo, NUM_BARS, PciDevice},
    prelude::*,
};

/// A memory BAR mapped into the kernel address space.
///
/// A window is released by passing it to [`unmap`], which consumes it, so a
/// window can be unmapped at most once.
#[derive(Debug)]
pub struct BarWindow {
    bar: u8,
    info: BarInfo,
    mem: Arc<dyn IoMem>,
}

impl BarWindow {
    /// The index of the BAR.
    pub fn bar(&self) -> u8 {
        self.bar
    }

    /// The physical address of the BAR.
    pub fn phys(&self) -> u64 {
        self.info.base
    }

    /// The length of the window, which equals the length of the BAR.
    pub fn len(&self) -> usize {
        self.mem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    /// The mapped memory.
    pub fn mem(&self) -> &Arc<dyn IoMem> {
        &self.mem
    }
}

/// Maps the memory BAR `bar` of `device`.
///
/// The regions of `device` must already be reserved. Either a window whose
/// length equals the BAR length is returned, or nothing is left mapped.
pub fn reserve_and_map(device: &dyn PciDevice, mapper: &dyn IoMapper, bar: u8) -> Result<BarWindow> {
    let info = (bar < NUM_BARS)
        .then(|| device.resource(bar))
        .flatten()
        .filter(BarInfo::is_mappable)
        .ok_or(Error::BarNotPresent(bar))?;
    let Ok(size) = usize::try_from(info.len) else {
        return Err(Error::MappingFailed {
            bar,
            size: usize::MAX,
        });
    };

    let Some(mem) = mapper.ioremap(info.base, size) else {
        return Err(Error::MappingFailed { bar, size });
    };
    if mem.len() != size {
        warn!(
            "ioremap of bar{} returned {} bytes instead of {}",
            bar,
            mem.len(),
            size
        );
        mapper.iounmap(mem);
        return Err(Error::MappingFailed { bar, size });
    }

    Ok(BarWindow { bar, info, mem })
}

/// Unmaps a window returned by [`reserve_and_map`].
pub fn unmap(mapper: &dyn IoMapper, window: BarWindow) {
    mapper.iounmap(window.mem);
}
