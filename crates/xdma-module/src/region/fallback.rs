//! Heap-backed region for platforms without mmap

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;
use xdma_core::constants::PAGE_SIZE;
use xdma_core::error::{Result, XdmaError};

fn layout(len: usize) -> Result<Layout> {
    Layout::from_size_align(len, PAGE_SIZE)
        .map_err(|_| XdmaError::InvalidConfig("shared region layout"))
}

pub(super) fn map(len: usize) -> Result<NonNull<u8>> {
    let layout = layout(len)?;
    let base = unsafe { alloc_zeroed(layout) };
    NonNull::new(base).ok_or(XdmaError::MapFailed(0))
}

pub(super) fn unmap(base: NonNull<u8>, len: usize) {
    if let Ok(layout) = layout(len) {
        unsafe { dealloc(base.as_ptr(), layout) };
    }
}

/// Pinning is unsupported here.
pub(super) fn lock(_base: NonNull<u8>, _len: usize) -> std::result::Result<(), &'static str> {
    Err("page locking unsupported on this platform")
}

pub(super) fn unlock(_base: NonNull<u8>, _len: usize) {}
