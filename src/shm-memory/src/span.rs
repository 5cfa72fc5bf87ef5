// Copyright 2026 The shm-access Authors
//
// Portions Copyright 2017 The Chromium OS Authors. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause

//! Types for volatile access to the shared-memory window.
//!
//! The window is device memory shared with other processors; the compiler
//! must not reorder or elide accesses to it, and handing out plain `&[u8]`
//! references to it would be unsound under concurrent modification from the
//! remote side. [`WindowSlice`] wraps a bounds-checked pointer range and
//! only ever touches it with volatile operations.

use std::cmp::min;
use std::error;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{read_volatile, write_volatile};
use std::result;

/// Window span errors.
#[derive(Debug)]
pub enum Error {
    /// `addr` is out of bounds of the window.
    OutOfBounds { addr: usize },
    /// Taking a span at `base` with `offset` would overflow `usize`.
    Overflow { base: usize, offset: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OutOfBounds { addr } => write!(f, "address 0x{:x} is out of bounds", addr),
            Error::Overflow { base, offset } => write!(
                f,
                "address 0x{:x} offset by 0x{:x} would overflow",
                base, offset
            ),
        }
    }
}

impl error::Error for Error {}

/// Result of window span operations.
pub type Result<T> = result::Result<T, Error>;

/// Convenience function for computing `base + offset` without wrapping.
pub fn compute_offset(base: usize, offset: usize) -> Result<usize> {
    match base.checked_add(offset) {
        None => Err(Error::Overflow { base, offset }),
        Some(m) => Ok(m),
    }
}

/// Types that hand out bounds-checked spans of window memory.
///
/// `get_slice` is the only way to obtain a [`WindowSlice`]; implementors
/// perform the range check before the raw pointer ever leaves them.
pub trait WindowMemory {
    /// Gets the size of this memory in bytes.
    fn len(&self) -> usize;

    /// Check whether the memory is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a [`WindowSlice`] of `count` bytes starting at `offset`.
    fn get_slice(&self, offset: usize, count: usize) -> Result<WindowSlice>;

    /// Returns the sum of `base` and `offset` if the resulting address is valid.
    fn compute_end_offset(&self, base: usize, offset: usize) -> Result<usize> {
        let mem_end = compute_offset(base, offset)?;
        if mem_end > self.len() {
            return Err(Error::OutOfBounds { addr: mem_end });
        }
        Ok(mem_end)
    }
}

impl<'a> WindowMemory for &'a mut [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn get_slice(&self, offset: usize, count: usize) -> Result<WindowSlice> {
        let _ = self.compute_end_offset(offset, count)?;
        unsafe {
            // This is safe because the pointer is range-checked by
            // compute_end_offset, and the lifetime is the same as the
            // original slice.
            Ok(WindowSlice::new(
                (self.as_ptr() as usize + offset) as *mut _,
                count,
            ))
        }
    }
}

/// A span of raw window memory that supports volatile access.
#[derive(Copy, Clone, Debug)]
pub struct WindowSlice<'a> {
    addr: *mut u8,
    size: usize,
    phantom: PhantomData<&'a u8>,
}

impl<'a> WindowSlice<'a> {
    /// Creates a span of raw memory that must support volatile access.
    ///
    /// # Safety
    ///
    /// To use this safely, the caller must guarantee that the memory at
    /// `addr` is `size` bytes long and is available for the duration of the
    /// lifetime of the new `WindowSlice`. The caller must also guarantee
    /// that all other users of the given chunk of memory are using volatile
    /// accesses.
    pub unsafe fn new(addr: *mut u8, size: usize) -> WindowSlice<'a> {
        WindowSlice {
            addr,
            size,
            phantom: PhantomData,
        }
    }

    /// Returns a pointer to the beginning of the span.
    pub fn as_ptr(&self) -> *mut u8 {
        self.addr
    }

    /// Gets the size of this span.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Checks if the span is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Copies as many bytes as possible from this span to `buf`.
    ///
    /// Copies `self.len()` or `buf.len()` bytes, whichever is smaller, from
    /// smallest to largest address using volatile reads. Returns the number
    /// of bytes copied.
    pub fn copy_to(&self, buf: &mut [u8]) -> usize {
        let count = min(self.size, buf.len());
        for (i, b) in buf[..count].iter_mut().enumerate() {
            // Safe because i < self.size, which was checked when the span
            // was created.
            *b = unsafe { read_volatile(self.addr.add(i)) };
        }
        count
    }

    /// Copies as many bytes as possible from `buf` to this span.
    ///
    /// The copy happens from smallest to largest address using volatile
    /// writes. Returns the number of bytes copied.
    pub fn copy_from(&self, buf: &[u8]) -> usize {
        let count = min(self.size, buf.len());
        for (i, b) in buf[..count].iter().enumerate() {
            // Safe because i < self.size, which was checked when the span
            // was created.
            unsafe { write_volatile(self.addr.add(i), *b) };
        }
        count
    }
}
