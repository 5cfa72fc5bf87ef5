// Copyright 2026 The shm-access Authors
// SPDX-License-Identifier: Apache-2.0

//! Session-level access to the shared-memory window.
//!
//! One process-wide window, any number of independent per-handle sessions.
//! A session carries its own cursor and offers the conventional
//! device-file surface: seek, read, write and direct mapping. The host
//! exposure layer (a character device shim, a test harness, whatever the
//! target environment offers) adapts [`DeviceOps`] to its own mechanism;
//! nothing in this crate registers with a host kernel.

use std::error;
use std::fmt;
use std::io;
use std::result;

pub mod config;
pub mod device;
pub mod session;

pub use crate::config::{ConfigError, WindowConfig};
pub use crate::device::{DeviceOps, ShmDevice};
pub use crate::session::{SeekOrigin, Session};
pub use shm_memory::WindowMapping;

/// Errors reported by the device operation surface.
#[derive(Debug)]
pub enum Error {
    /// The window configuration is invalid.
    Config(ConfigError),
    /// The physical range is already reserved by another owner.
    RegionBusy,
    /// The physical-to-virtual mapping could not be established.
    MapFailed(io::Error),
    /// Unsupported seek origin code.
    InvalidOrigin(i32),
    /// The seek target lands outside the window.
    Overflow { target: i64, size: usize },
    /// Invalid map request: nonzero page offset, or a length outside the
    /// window.
    InvalidArgument,
    /// The window went away during an access.
    Fault,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "{}", e),
            Error::RegionBusy => write!(f, "the window region is already reserved"),
            Error::MapFailed(e) => write!(f, "cannot map the window: {}", e),
            Error::InvalidOrigin(origin) => write!(f, "unsupported seek origin {}", origin),
            Error::Overflow { target, size } => write!(
                f,
                "seek target {:#x} is out of the window size {:#x}",
                target, size
            ),
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::Fault => write!(f, "window access faulted"),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<shm_memory::mmap::Error> for Error {
    fn from(e: shm_memory::mmap::Error) -> Self {
        use shm_memory::mmap::Error as MmapError;
        match e {
            MmapError::RegionBusy => Error::RegionBusy,
            MmapError::Open(e) | MmapError::Lock(e) | MmapError::Mmap(e) => Error::MapFailed(e),
        }
    }
}
