// Copyright 2026 The shm-access Authors
// SPDX-License-Identifier: Apache-2.0

//! The window device and its operation surface.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use shm_memory::{ShmWindow, WindowMapping};

use crate::config::WindowConfig;
use crate::session::{SeekOrigin, Session};
use crate::Result;

/// Acquires a read guard on the window, recovering from a poisoned lock.
///
/// A panic while holding the lock cannot corrupt the window bookkeeping,
/// so the remaining sessions keep being served.
pub(crate) fn read_guard(lock: &RwLock<ShmWindow>) -> RwLockReadGuard<ShmWindow> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn write_guard(lock: &RwLock<ShmWindow>) -> RwLockWriteGuard<ShmWindow> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Operation surface of an open handle, mirroring a device-file interface.
///
/// Host exposure layers adapt this trait to whatever device mechanism the
/// target environment offers; sessions are driven exclusively through it.
pub trait DeviceOps {
    /// Moves the cursor and returns the new position.
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64>;

    /// Reads at the cursor, advancing it by the count actually copied.
    ///
    /// Short reads happen at the window boundary; a cursor at the end
    /// yields `Ok(0)`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes at the cursor, advancing it by the count actually copied.
    /// Short writes mirror short reads.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Maps the first `len` bytes of the window into the caller's address
    /// space, independent of the cursor. `page_offset` must be 0: the
    /// window is only mappable from its start.
    fn map(&self, len: usize, page_offset: u64) -> Result<WindowMapping>;
}

/// The shared-memory window exposed as a device.
#[derive(Debug)]
pub struct ShmDevice {
    window: Arc<RwLock<ShmWindow>>,
}

impl ShmDevice {
    /// Validates `config`, then reserves and maps the window.
    pub fn new(config: &WindowConfig) -> Result<ShmDevice> {
        config.validate()?;
        let window = ShmWindow::new(&config.backing_path, config.mem_start, config.mem_size)?;
        Ok(ShmDevice {
            window: Arc::new(RwLock::new(window)),
        })
    }

    /// Opens a session with its cursor at the start of the window.
    ///
    /// Always succeeds, also on a torn-down window; such sessions fail
    /// their accesses with `Fault`.
    pub fn open(&self) -> Session {
        Session::new(self.window.clone())
    }

    /// Number of live sessions, for diagnostics only.
    pub fn session_count(&self) -> usize {
        read_guard(&self.window).session_count()
    }

    /// Unmaps the window and releases the region reservation.
    ///
    /// Idempotent. Open sessions survive, but their accesses fail from
    /// here on; teardown itself never fails.
    pub fn teardown(&self) {
        debug!("shm device: teardown");
        write_guard(&self.window).teardown();
    }
}
