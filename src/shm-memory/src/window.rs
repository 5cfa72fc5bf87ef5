// Copyright 2026 The shm-access Authors
// SPDX-License-Identifier: Apache-2.0

//! Window lifecycle and the translate choke point.

use std::error;
use std::fmt;
use std::path::Path;
use std::result;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};

use crate::mmap::{self, MappedWindow, WindowMapping};
use crate::span::{WindowMemory, WindowSlice};

/// Errors reported when accessing the window.
#[derive(Debug)]
pub enum Error {
    /// The window is not currently mapped.
    NotMapped,
    /// `offset + count` does not fit in the window.
    OutOfRange { offset: usize, count: usize },
    /// A caller mapping could not be established.
    Map(mmap::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotMapped => write!(f, "the window is not mapped"),
            Error::OutOfRange { offset, count } => write!(
                f,
                "access of {:#x} bytes at offset {:#x} is outside the window",
                count, offset
            ),
            Error::Map(e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// The process-wide shared-memory window.
///
/// Constructed once at startup and shared by reference. A mapping is
/// present exactly between construction and [`ShmWindow::teardown`]; after
/// teardown every access fails until a new window is constructed over the
/// range.
#[derive(Debug)]
pub struct ShmWindow {
    base_addr: u64,
    size: usize,
    mapped: Option<MappedWindow>,
    sessions: AtomicUsize,
}

impl ShmWindow {
    /// Reserves and maps `[base_addr, base_addr + size)` of the device at
    /// `path`.
    pub fn new(path: &Path, base_addr: u64, size: usize) -> mmap::Result<ShmWindow> {
        let mapped = MappedWindow::new(path, base_addr, size)?;
        Ok(ShmWindow {
            base_addr,
            size,
            mapped: Some(mapped),
            sessions: AtomicUsize::new(0),
        })
    }

    /// Returns the physical base address of the window.
    pub fn base_addr(&self) -> u64 {
        self.base_addr
    }

    /// Returns the size of the window in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the window currently holds its mapping.
    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// Unmaps the window and releases the region reservation.
    ///
    /// Idempotent: calling it on an already-torn-down window does nothing.
    pub fn teardown(&mut self) {
        if let Some(mapped) = self.mapped.take() {
            info!("shm window: {:#010x} unmapped", mapped.base_addr());
        }
    }

    /// Returns a span of mapped memory backing `[offset, offset + count)`.
    ///
    /// This is the single bounds check for window accesses; every copy
    /// path goes through the span returned here and nothing else touches
    /// the mapping.
    pub fn translate(&self, offset: usize, count: usize) -> Result<WindowSlice> {
        let mapped = self.mapped.as_ref().ok_or(Error::NotMapped)?;
        mapped
            .get_slice(offset, count)
            .map_err(|_| Error::OutOfRange { offset, count })
    }

    /// Builds a caller-visible mapping of the first `len` bytes of the
    /// window.
    pub fn map_for_caller(&self, len: usize) -> Result<WindowMapping> {
        let mapped = self.mapped.as_ref().ok_or(Error::NotMapped)?;
        mapped.map_for_caller(len).map_err(Error::Map)
    }

    /// Notes a newly opened session and returns the live count.
    ///
    /// The count is diagnostic only; it never gates teardown.
    pub fn session_opened(&self) -> usize {
        let live = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("shm window: session opened, {} live", live);
        live
    }

    /// Notes a closed session and returns the live count.
    pub fn session_closed(&self) -> usize {
        let live = self.sessions.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!("shm window: session closed, {} live", live);
        live
    }

    /// Number of sessions currently open on the window.
    pub fn session_count(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}
