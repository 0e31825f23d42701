// SPDX-License-Identifier: MPL-2.0

pub(crate) use alloc::{
    format,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
pub(crate) use core::fmt::Debug;

pub(crate) use log::{debug, error, info, warn};

pub(crate) use crate::{
    DRIVER_NAME,
    error::{Errno, Error},
};

pub(crate) type Result<T> = core::result::Result<T, Error>;
