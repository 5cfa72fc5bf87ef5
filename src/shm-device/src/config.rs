// Copyright 2026 The shm-access Authors
// SPDX-License-Identifier: Apache-2.0

//! Wrapper for configuring the shared-memory window.

use std::error;
use std::fmt;
use std::path::PathBuf;

use shm_memory::page_size;

/// Default physical base address of the shared window.
pub const DEFAULT_MEM_START: u64 = 0x4000_0000;
/// Default window size in bytes.
pub const DEFAULT_MEM_SIZE: usize = 0x1000_0000;
/// Default device node carrying the physical window.
pub const DEFAULT_BACKING_PATH: &str = "/dev/mem";

#[derive(Debug)]
pub enum ConfigError {
    /// The window size is zero.
    ZeroSize,
    /// The window base is not aligned to the host page size.
    UnalignedBase { mem_start: u64, page_size: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::ZeroSize => write!(f, "the window size must be greater than zero"),
            ConfigError::UnalignedBase {
                mem_start,
                page_size,
            } => write!(
                f,
                "window base {:#010x} is not aligned to the {} byte page size",
                mem_start, page_size
            ),
        }
    }
}

impl error::Error for ConfigError {}

/// Configuration of the shared-memory window, fixed for the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    /// Physical base address of the window.
    pub mem_start: u64,
    /// Window length in bytes.
    pub mem_size: usize,
    /// Device node through which the physical range is reached.
    pub backing_path: PathBuf,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            mem_start: DEFAULT_MEM_START,
            mem_size: DEFAULT_MEM_SIZE,
            backing_path: PathBuf::from(DEFAULT_BACKING_PATH),
        }
    }
}

impl WindowConfig {
    /// Checks the invariants the mapping layer relies on.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.mem_size == 0 {
            return Err(ConfigError::ZeroSize);
        }
        let page = page_size();
        if self.mem_start % page as u64 != 0 {
            return Err(ConfigError::UnalignedBase {
                mem_start: self.mem_start,
                page_size: page,
            });
        }
        Ok(())
    }
}
