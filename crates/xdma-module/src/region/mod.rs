//! Shared DMA region
//!
//! One contiguous, page-aligned, zero-initialized block that both the
//! controller and the engine address by byte offset. Platform-specific
//! implementations handle mapping and pinning.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix as platform;
    } else {
        mod fallback;
        use fallback as platform;
    }
}

use xdma_core::constants::PAGE_SIZE;
use xdma_core::error::{Result, XdmaError};
use xdma_core::kwarn;
use std::ptr::NonNull;

/// Page-aligned shared memory block.
///
/// The bus address of byte `i` is `bus_addr() + i`. In-process the
/// simulated hardware addresses memory directly, so the bus address is
/// the virtual address of the base.
pub struct SharedRegion {
    base: NonNull<u8>,
    len: usize,
    locked: bool,
}

// Safety: the region is plain memory owned by this struct until Drop.
// Concurrent access to disjoint ranges is coordinated by the arena and
// the transfer engine, the same contract the hardware has with a driver.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Map `len` bytes (rounded up to a page), zero-filled.
    ///
    /// With `lock`, the pages are pinned. Pinning is best-effort: a
    /// refused lock is logged and the region stays usable.
    pub fn new(len: usize, lock: bool) -> Result<Self> {
        if len == 0 {
            return Err(XdmaError::InvalidConfig("shared region must not be empty"));
        }
        let len = len
            .checked_add(PAGE_SIZE - 1)
            .map(|l| l & !(PAGE_SIZE - 1))
            .ok_or(XdmaError::InvalidConfig("shared region size overflows"))?;

        let base = platform::map(len)?;
        let locked = lock && match platform::lock(base, len) {
            Ok(()) => true,
            Err(e) => {
                kwarn!("xdma: could not pin {} byte region ({}), continuing unpinned", len, e);
                false
            }
        };

        Ok(Self { base, len, locked })
    }

    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Bus address of the first byte.
    #[inline]
    pub fn bus_addr(&self) -> u64 {
        self.base.as_ptr() as usize as u64
    }

    /// Whether `ptr` points inside the region.
    #[inline]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.base.as_ptr() as usize;
        let p = ptr as usize;
        p >= start && p - start < self.len
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if self.locked {
            platform::unlock(self.base, self.len);
        }
        platform::unmap(self.base, self.len);
    }
}
