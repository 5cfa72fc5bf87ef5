// Copyright 2026 The shm-access Authors
// SPDX-License-Identifier: Apache-2.0

//! Bounds-checked access to a fixed physical shared-memory window.
//!
//! The window is a DDR range reserved for inter-processor shared memory,
//! reached through a mappable device node (`/dev/mem` on a real target).
//! This crate owns the physical-to-virtual mapping of that range and hands
//! out volatile, bounds-checked spans of it; no code outside this crate
//! touches window memory directly.

pub mod mmap;
pub mod span;
pub mod window;

pub use crate::mmap::{page_size, MappedWindow, WindowMapping};
pub use crate::span::{WindowMemory, WindowSlice};
pub use crate::window::ShmWindow;
