// Copyright 2026 The shm-access Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-handle sessions over the shared window.

use std::cmp::min;
use std::sync::{Arc, RwLock};

use log::error;

use shm_memory::window::Error as WindowError;
use shm_memory::{ShmWindow, WindowMapping};

use crate::device::{read_guard, DeviceOps};
use crate::{Error, Result};

/// Where a seek is measured from.
///
/// Raw codes follow the conventional `SEEK_SET`/`SEEK_CUR`/`SEEK_END`
/// numbering so host adapters can pass whence values straight through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekOrigin {
    /// From the start of the window.
    Start,
    /// Relative to the session's current offset, as a signed delta.
    Current,
    /// Measured back from the end of the window: the target is
    /// `size - offset`, the distance left before the window ends.
    /// Existing callers depend on this exact arithmetic; it is pinned
    /// behavior, not an offset past the end.
    End,
}

impl SeekOrigin {
    /// Maps a raw whence code onto an origin.
    pub fn from_raw(raw: i32) -> Result<SeekOrigin> {
        match raw {
            libc::SEEK_SET => Ok(SeekOrigin::Start),
            libc::SEEK_CUR => Ok(SeekOrigin::Current),
            libc::SEEK_END => Ok(SeekOrigin::End),
            _ => {
                error!("shm session: seek origin {} unsupported", raw);
                Err(Error::InvalidOrigin(raw))
            }
        }
    }
}

/// A caller's open handle on the window, with its own cursor.
///
/// The cursor is owned exclusively by the holder of the session, so
/// operations on one session never observe another session's position;
/// all sessions observe the same underlying window contents.
#[derive(Debug)]
pub struct Session {
    window: Arc<RwLock<ShmWindow>>,
    offset: usize,
}

impl Session {
    pub(crate) fn new(window: Arc<RwLock<ShmWindow>>) -> Session {
        read_guard(&window).session_opened();
        Session { window, offset: 0 }
    }

    /// Current cursor position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Releases the handle.
    pub fn close(self) {}
}

impl Drop for Session {
    fn drop(&mut self) {
        read_guard(&self.window).session_closed();
    }
}

impl DeviceOps for Session {
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64> {
        let size = read_guard(&self.window).size();
        let target = match origin {
            SeekOrigin::Start => offset,
            SeekOrigin::Current => (self.offset as i64).checked_add(offset).unwrap_or(i64::MAX),
            SeekOrigin::End => (size as i64).checked_sub(offset).unwrap_or(i64::MIN),
        };
        if target < 0 || target >= size as i64 {
            error!(
                "shm session: seek target {:#x} is out of the window size {:#x}",
                target, size
            );
            return Err(Error::Overflow { target, size });
        }
        self.offset = target as usize;
        Ok(self.offset as u64)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let window = read_guard(&self.window);
        let count = min(buf.len(), window.size().saturating_sub(self.offset));
        let offset = self.offset;
        let slice = window.translate(offset, count).map_err(|e| {
            error!("shm session: read at {:#x} failed: {}", offset, e);
            Error::Fault
        })?;
        let copied = slice.copy_to(&mut buf[..count]);
        self.offset += copied;
        Ok(copied)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let window = read_guard(&self.window);
        let count = min(buf.len(), window.size().saturating_sub(self.offset));
        let offset = self.offset;
        let slice = window.translate(offset, count).map_err(|e| {
            error!("shm session: write at {:#x} failed: {}", offset, e);
            Error::Fault
        })?;
        let copied = slice.copy_from(&buf[..count]);
        self.offset += copied;
        Ok(copied)
    }

    fn map(&self, len: usize, page_offset: u64) -> Result<WindowMapping> {
        let window = read_guard(&self.window);
        if page_offset != 0 {
            error!("shm session: map page offset {:#x} must be 0", page_offset);
            return Err(Error::InvalidArgument);
        }
        if len == 0 || len > window.size() {
            error!(
                "shm session: map length {:#x} is out of the window size {:#x}",
                len,
                window.size()
            );
            return Err(Error::InvalidArgument);
        }
        window.map_for_caller(len).map_err(|e| match e {
            WindowError::NotMapped => {
                error!("shm session: map of {:#x} bytes failed: {}", len, e);
                Error::Fault
            }
            WindowError::Map(e) => Error::from(e),
            WindowError::OutOfRange { .. } => Error::Fault,
        })
    }
}
