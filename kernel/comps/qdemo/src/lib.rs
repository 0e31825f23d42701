// SPDX-License-Identifier: MPL-2.0

//! The driver of the qdemo device, an inter-VM shared memory PCI device
//! emulated by QEMU (vendor `0x1234`, device `0x12e8`).
//!
//! The device exposes three BARs: a register block (BAR0), the MSI-X table
//! (BAR1) and the shared memory (BAR2). The driver maps BAR0 and BAR2,
//! publishes the device as the character device node `qdemo<minor>`, and on
//! the MSI-X capable revision of the device requests a block of MSI-X vectors
//! whenever the device reports a peer through its IVPosition register.
//!
//! The driver reaches the rest of the kernel only through the traits in
//! [`pci`], [`io_mem`] and [`chrdev`], bundled as [`HostServices`].
//! Loading the module registers the driver with the PCI bus:
//!
//! ```rust ignore
//! let module = QdemoModule::init(host)?;
//! // The bus probes matching devices from now on.
//! module.exit();
//! ```

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod chrdev;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod interrupt;
pub mod io_mem;
#[cfg(test)]
mod mock;
pub mod node;
pub mod pci;
mod prelude;
pub mod regs;
pub mod resource;

use core::fmt;

pub use self::{
    config::QdemoConfig,
    device::{ProbeState, QdemoDevice},
    driver::{DeviceInfo, QdemoDriver},
    error::{Errno, Error},
};
use self::{
    chrdev::{CharDeviceSubsystem, QdemoFileOps},
    io_mem::IoMapper,
    pci::{MsixController, PciBus, PciDriver},
    prelude::*,
};

/// The name the driver registers, reserves regions and names nodes under.
pub const DRIVER_NAME: &str = "qdemo";

/// The version of the driver.
pub const DRIVER_VERSION: &str = "0.1";

/// The host subsystems the driver consumes.
#[derive(Clone)]
pub struct HostServices {
    pub bus: Arc<dyn PciBus>,
    pub mapper: Arc<dyn IoMapper>,
    pub msix: Arc<dyn MsixController>,
    pub chrdev: Arc<dyn CharDeviceSubsystem>,
}

impl fmt::Debug for HostServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}

/// The loaded driver module.
///
/// Dropping the value without calling [`QdemoModule::exit`] leaves the
/// driver registered.
pub struct QdemoModule {
    bus: Arc<dyn PciBus>,
    driver: Arc<QdemoDriver>,
}

impl fmt::Debug for QdemoModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QdemoModule")
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

impl QdemoModule {
    /// Loads the driver with the compiled-in configuration.
    pub fn init(host: HostServices) -> Result<Self> {
        Self::init_with_config(host, QdemoConfig::default())
    }

    /// Loads the driver.
    ///
    /// Reserves the device numbers, creates the device class and the device
    /// table, and finally registers the driver with the PCI bus. On failure
    /// everything done so far is undone.
    pub fn init_with_config(host: HostServices, config: QdemoConfig) -> Result<Self> {
        info!("{} init, version {}", DRIVER_NAME, DRIVER_VERSION);
        if let Err(error) = config.validate() {
            error!("{:?}: {}", config, error);
            return Err(error);
        }

        let identity = node::register_device_identity(
            &*host.chrdev,
            Arc::new(QdemoFileOps),
            config.max_devices,
        )?;

        let bus = host.bus.clone();
        let driver = Arc::new(QdemoDriver::new(host, identity, config));
        if let Err(errno) = bus.register_driver(driver.clone()) {
            error!("unable to register driver: {}", errno);
            driver.shutdown();
            return Err(Error::DriverRegistrationFailed(errno));
        }

        Ok(Self { bus, driver })
    }

    /// Unloads the driver.
    ///
    /// The driver is unregistered from the PCI bus before any driver-wide
    /// state is released, so no probe can race with the release.
    pub fn exit(self) {
        let driver: Arc<dyn PciDriver> = self.driver.clone();
        self.bus.unregister_driver(&driver);
        self.driver.shutdown();
        info!("{} exit", DRIVER_NAME);
    }

    pub fn driver(&self) -> &Arc<QdemoDriver> {
        &self.driver
    }
}
