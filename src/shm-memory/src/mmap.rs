// Copyright 2026 The shm-access Authors
//
// Portions Copyright 2017 The Chromium OS Authors. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause

//! mmap-backed view of the physical shared-memory window.
//!
//! The physical window is reached through a backing device node
//! (`/dev/mem` on a real target, any mappable file in tests). Opening it
//! with `O_SYNC` gives uncached access to device memory, and a
//! non-blocking open-file-description record lock over
//! `[base_addr, base_addr + size)` reserves the range for exclusive use.

use std::error;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::ptr::null_mut;
use std::result;

use log::{error, info};

use crate::span::{self, WindowMemory, WindowSlice};

/// Error conditions that may arise when mapping the window.
#[derive(Debug)]
pub enum Error {
    /// The backing device could not be opened.
    Open(io::Error),
    /// The requested physical range is already reserved by another owner.
    RegionBusy,
    /// Placing the region reservation failed for a reason other than
    /// contention.
    Lock(io::Error),
    /// The `mmap` call returned an error.
    Mmap(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open(e) => write!(f, "cannot open the backing device: {}", e),
            Error::RegionBusy => write!(f, "the window region is already reserved"),
            Error::Lock(e) => write!(f, "cannot reserve the window region: {}", e),
            Error::Mmap(e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// Returns the host page size in bytes.
pub fn page_size() -> usize {
    // Trivially safe.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// Reserves `[base_addr, base_addr + size)` of the backing device.
///
/// Open-file-description locks conflict between distinct open descriptions
/// even within one process, so a second reservation of an overlapping range
/// fails until the first holder closes its handle.
fn reserve_region(backing: &File, base_addr: u64, size: usize) -> Result<()> {
    let lock = libc::flock {
        l_type: libc::F_WRLCK as libc::c_short,
        l_whence: libc::SEEK_SET as libc::c_short,
        l_start: base_addr as libc::off_t,
        l_len: size as libc::off_t,
        l_pid: 0,
    };
    // Safe because the lock argument is a valid flock struct that outlives
    // the call.
    let rc = unsafe { libc::fcntl(backing.as_raw_fd(), libc::F_OFD_SETLK, &lock) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        return match err.raw_os_error() {
            Some(libc::EAGAIN) | Some(libc::EACCES) => {
                error!(
                    "shm window: region {:#010x}+{:#x} is held by another owner",
                    base_addr, size
                );
                Err(Error::RegionBusy)
            }
            _ => Err(Error::Lock(err)),
        };
    }
    Ok(())
}

/// A live mapping of the physical window into this process.
///
/// Owns the backing device handle; the record lock placed at construction
/// is the window reservation and is released when the handle closes, so
/// dropping the mapping gives the range back in one step.
#[derive(Debug)]
pub struct MappedWindow {
    addr: *mut u8,
    size: usize,
    base_addr: u64,
    backing: File,
}

// Send and Sync aren't automatically inherited for the raw address pointer.
// Accessing that pointer is only done through bounds-checked volatile
// spans, which allows the object to be shared by multiple threads without
// a decrease in safety.
unsafe impl Send for MappedWindow {}
unsafe impl Sync for MappedWindow {}

impl MappedWindow {
    /// Opens the device at `path`, reserves `[base_addr, base_addr + size)`
    /// and maps it into the process.
    ///
    /// On any failure, everything acquired up to that point is released
    /// before returning: the reservation lives on the backing handle, so a
    /// failed `mmap` drops it along with the `File`.
    pub fn new(path: &Path, base_addr: u64, size: usize) -> Result<Self> {
        let backing = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(Error::Open)?;

        reserve_region(&backing, base_addr, size)?;

        // Safe because we're asking for a new anonymous placement and
        // invalid parameters surface as MAP_FAILED rather than breaking
        // Rust safety guarantees.
        let addr = unsafe {
            libc::mmap(
                null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_NORESERVE,
                backing.as_raw_fd(),
                base_addr as libc::off_t,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(Error::Mmap(io::Error::last_os_error()));
        }

        info!("shm window: {:#010x} mapped to {:p}", base_addr, addr);
        Ok(MappedWindow {
            addr: addr as *mut u8,
            size,
            base_addr,
            backing,
        })
    }

    /// Returns the size of the window in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the physical base address of the window.
    pub fn base_addr(&self) -> u64 {
        self.base_addr
    }

    /// Builds an additional caller-visible mapping of the first `len`
    /// bytes of the window, sharing the backing device handle.
    ///
    /// The caller mapping is independent of this one and lives until its
    /// descriptor is dropped.
    pub fn map_for_caller(&self, len: usize) -> Result<WindowMapping> {
        // Safe for the same reason as the window mapping above.
        let addr = unsafe {
            libc::mmap(
                null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_NORESERVE,
                self.backing.as_raw_fd(),
                self.base_addr as libc::off_t,
            )
        };
        if addr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            error!("shm window: caller mapping of {:#x} bytes failed: {}", len, err);
            return Err(Error::Mmap(err));
        }
        Ok(WindowMapping {
            addr: addr as *mut u8,
            size: len,
        })
    }
}

impl WindowMemory for MappedWindow {
    fn len(&self) -> usize {
        self.size
    }

    fn get_slice(&self, offset: usize, count: usize) -> span::Result<WindowSlice> {
        let end = span::compute_offset(offset, count)?;
        if end > self.size {
            return Err(span::Error::OutOfBounds { addr: end });
        }

        // Safe because we checked that offset + count was within our range
        // and we only ever hand out volatile accessors.
        Ok(unsafe { WindowSlice::new(self.addr.add(offset), count) })
    }
}

impl Drop for MappedWindow {
    fn drop(&mut self) {
        // Safe because we mapped the range at addr ourselves, and nobody
        // else is holding a reference to it.
        unsafe {
            libc::munmap(self.addr as *mut libc::c_void, self.size);
        }
    }
}

/// Owned descriptor of a caller-requested direct mapping of the window.
///
/// Unmapped when dropped.
#[derive(Debug)]
pub struct WindowMapping {
    addr: *mut u8,
    size: usize,
}

// See the Send/Sync rationale on MappedWindow; the caller mapping hands
// out its pointer, and what the caller does with it is between the caller
// and the remote processors sharing the window.
unsafe impl Send for WindowMapping {}
unsafe impl Sync for WindowMapping {}

impl WindowMapping {
    /// Returns a pointer to the beginning of the mapping.
    pub fn as_ptr(&self) -> *mut u8 {
        self.addr
    }

    /// Returns the length of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Checks if the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Drop for WindowMapping {
    fn drop(&mut self) {
        // Safe because we mapped the range at addr ourselves, and nobody
        // else is holding a reference to it.
        unsafe {
            libc::munmap(self.addr as *mut libc::c_void, self.size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use vmm_sys_util::tempfile::TempFile;

    fn backing_file(len: u64) -> TempFile {
        let file = TempFile::new().unwrap();
        file.as_file().set_len(len).unwrap();
        file
    }

    #[test]
    fn test_window_new() {
        let pg = page_size();
        let base = pg as u64;
        let size = 4 * pg;
        let file = backing_file(base + size as u64);

        let w = MappedWindow::new(file.as_path(), base, size).unwrap();
        assert_eq!(w.size(), size);
        assert_eq!(w.base_addr(), base);
    }

    #[test]
    fn test_window_open_error() {
        let r = MappedWindow::new(Path::new("/this/path/does/not/exist"), 0, 4096);
        assert!(matches!(r, Err(Error::Open(_))));
    }

    #[test]
    fn test_region_busy() {
        let pg = page_size();
        let base = pg as u64;
        let size = 4 * pg;
        let file = backing_file(base + 8 * pg as u64);

        let w = MappedWindow::new(file.as_path(), base, size).unwrap();

        // Overlapping range, separate handle: busy.
        let r = MappedWindow::new(file.as_path(), base, size);
        assert!(matches!(r, Err(Error::RegionBusy)));

        // Disjoint range on the same backing is reservable.
        let other = MappedWindow::new(file.as_path(), base + size as u64, pg).unwrap();
        drop(other);

        // Releasing the first reservation frees the range.
        drop(w);
        MappedWindow::new(file.as_path(), base, size).unwrap();
    }

    #[test]
    fn test_get_slice_bounds() {
        let pg = page_size();
        let size = 2 * pg;
        let file = backing_file(size as u64);
        let w = MappedWindow::new(file.as_path(), 0, size).unwrap();

        assert_eq!(w.get_slice(0, size).unwrap().len(), size);
        assert_eq!(w.get_slice(size, 0).unwrap().len(), 0);
        assert!(w.get_slice(size - 1, 2).is_err());
        assert!(w.get_slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_window_round_trip() {
        let pg = page_size();
        let base = pg as u64;
        let size = 2 * pg;
        let file = backing_file(base + size as u64);
        let w = MappedWindow::new(file.as_path(), base, size).unwrap();

        let src = [0x5au8; 64];
        assert_eq!(w.get_slice(128, 64).unwrap().copy_from(&src), 64);
        let mut dst = [0u8; 64];
        assert_eq!(w.get_slice(128, 64).unwrap().copy_to(&mut dst), 64);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_caller_mapping() {
        let pg = page_size();
        let size = 2 * pg;
        let file = backing_file(size as u64);
        let w = MappedWindow::new(file.as_path(), 0, size).unwrap();

        let mapping = w.map_for_caller(pg).unwrap();
        assert_eq!(mapping.len(), pg);
        assert!(!mapping.is_empty());

        // Writes through the caller mapping land in the window.
        unsafe { std::ptr::write_volatile(mapping.as_ptr(), 0xee) };
        let mut b = [0u8; 1];
        w.get_slice(0, 1).unwrap().copy_to(&mut b);
        assert_eq!(b[0], 0xee);
    }
}
