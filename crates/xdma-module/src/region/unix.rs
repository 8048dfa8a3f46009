//! Unix mapping using mmap

use nix::errno::Errno;
use nix::sys::mman::{MapFlags, ProtFlags};
use std::ptr::NonNull;
use xdma_core::error::{Result, XdmaError};

/// Anonymous shared read/write mapping. The kernel zero-fills it.
pub(super) fn map(len: usize) -> Result<NonNull<u8>> {
    let prot = ProtFlags::PROT_READ | ProtFlags::PROT_WRITE;
    let flags = MapFlags::MAP_SHARED | MapFlags::MAP_ANONYMOUS;

    let base = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            prot.bits(),
            flags.bits(),
            -1,
            0,
        )
    };

    if base == libc::MAP_FAILED {
        return Err(XdmaError::MapFailed(Errno::last() as i32));
    }

    NonNull::new(base as *mut u8).ok_or(XdmaError::MapFailed(libc::EFAULT))
}

pub(super) fn unmap(base: NonNull<u8>, len: usize) {
    unsafe {
        libc::munmap(base.as_ptr() as *mut libc::c_void, len);
    }
}

pub(super) fn lock(base: NonNull<u8>, len: usize) -> std::result::Result<(), Errno> {
    let ret = unsafe { libc::mlock(base.as_ptr() as *const libc::c_void, len) };
    if ret != 0 {
        return Err(Errno::last());
    }
    Ok(())
}

pub(super) fn unlock(base: NonNull<u8>, len: usize) {
    unsafe {
        libc::munlock(base.as_ptr() as *const libc::c_void, len);
    }
}
