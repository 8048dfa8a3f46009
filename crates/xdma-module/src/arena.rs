//! Arena allocator over the shared region
//!
//! Monotonic bump allocation in `BLOCK_SIZE` units. Buffers are never
//! freed individually; `reset` reclaims everything at once and bumps the
//! generation so buffers handed out earlier can be recognized as stale.
//!
//! Every allocation starts on a block boundary because the cursor only
//! ever advances by block-rounded sizes.

use crate::region::SharedRegion;
use std::ptr::NonNull;
use std::sync::Mutex;
use xdma_core::calc_size;
use xdma_core::error::{Result, XdmaError};

struct Cursor {
    next_free: usize,
    generation: u64,
}

pub struct Arena {
    region: SharedRegion,
    /// Usable bytes; the mapping behind it is page-rounded.
    capacity: usize,
    cursor: Mutex<Cursor>,
}

/// A block-aligned slice of the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaBuf {
    ptr: NonNull<u8>,
    offset: u32,
    size: usize,
    requested: usize,
    generation: u64,
}

// Safety: an ArenaBuf is an address range, not ownership. Access goes
// through raw pointers or the arena's bounds-checked helpers.
unsafe impl Send for ArenaBuf {}
unsafe impl Sync for ArenaBuf {}

impl ArenaBuf {
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Byte offset from the arena base. Always a multiple of `BLOCK_SIZE`.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Reserved size (block-rounded).
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes the caller asked for (`length * element_size`).
    #[inline]
    pub fn requested_len(&self) -> usize {
        self.requested
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.requested == 0
    }
}

impl Arena {
    /// Map a fresh region of at least `capacity` bytes.
    ///
    /// Only `capacity` bytes are handed out even though the mapping is
    /// rounded up to whole pages. Offsets travel as `u32`, so capacity is
    /// capped at 4 GiB.
    pub fn new(capacity: usize, lock: bool) -> Result<Self> {
        if capacity > u32::MAX as usize {
            return Err(XdmaError::InvalidConfig("arena capacity exceeds 4 GiB"));
        }
        let mut arena = Self::from_region(SharedRegion::new(capacity, lock)?);
        arena.capacity = capacity;
        Ok(arena)
    }

    /// An arena spanning the whole region.
    pub fn from_region(region: SharedRegion) -> Self {
        Self {
            capacity: region.len(),
            region,
            cursor: Mutex::new(Cursor { next_free: 0, generation: 0 }),
        }
    }

    #[inline]
    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.region.base()
    }

    /// Bus address of `offset`.
    #[inline]
    pub fn bus_addr(&self, offset: u32) -> u64 {
        self.region.bus_addr() + offset as u64
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve `calc_size(length, element_size)` bytes.
    ///
    /// A zero-length request yields an empty buffer at the cursor and
    /// leaves the cursor where it is.
    pub fn allocate(&self, length: usize, element_size: usize) -> Result<ArenaBuf> {
        let mut cursor = self.lock();
        let remaining = self.capacity() - cursor.next_free;

        let size = calc_size(length, element_size).ok_or(XdmaError::CapacityExceeded {
            requested: usize::MAX,
            remaining,
        })?;
        if size > remaining {
            return Err(XdmaError::CapacityExceeded { requested: size, remaining });
        }

        let offset = cursor.next_free;
        cursor.next_free += size;

        let ptr = unsafe { NonNull::new_unchecked(self.base().add(offset)) };
        Ok(ArenaBuf {
            ptr,
            offset: offset as u32,
            size,
            requested: length * element_size,
            generation: cursor.generation,
        })
    }

    /// Offset of `ptr` from the arena base.
    pub fn offset_of(&self, ptr: *const u8) -> Result<u32> {
        if !self.region.contains(ptr) {
            return Err(XdmaError::OutOfArena);
        }
        Ok((ptr as usize - self.base() as usize) as u32)
    }

    /// Reclaim everything. Outstanding buffers become stale.
    pub fn reset(&self) {
        let mut cursor = self.lock();
        cursor.next_free = 0;
        cursor.generation += 1;
    }

    pub fn cursor(&self) -> usize {
        self.lock().next_free
    }

    pub fn remaining(&self) -> usize {
        self.capacity() - self.lock().next_free
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Fail if `buf` was handed out before the last reset.
    pub fn check(&self, buf: &ArenaBuf) -> Result<()> {
        let generation = self.generation();
        if buf.generation != generation || !self.region.contains(buf.as_ptr()) {
            return Err(XdmaError::StaleBuffer {
                buffer_generation: buf.generation,
                arena_generation: generation,
            });
        }
        Ok(())
    }

    /// Fail unless `[offset, offset + len)` lies within the arena.
    pub fn check_range(&self, offset: u64, len: u64) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity() as u64 => Ok(()),
            _ => Err(XdmaError::OutOfBounds { offset, len, capacity: self.capacity() }),
        }
    }

    pub fn write_at(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_range(offset as u64, data.len() as u64)?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.base().add(offset), data.len());
        }
        Ok(())
    }

    pub fn read_at(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        self.check_range(offset as u64, out.len() as u64)?;
        unsafe {
            std::ptr::copy_nonoverlapping(self.base().add(offset), out.as_mut_ptr(), out.len());
        }
        Ok(())
    }

    pub fn fill(&self, offset: usize, len: usize, byte: u8) -> Result<()> {
        self.check_range(offset as u64, len as u64)?;
        unsafe {
            std::ptr::write_bytes(self.base().add(offset), byte, len);
        }
        Ok(())
    }
}

/// Something that owns an arena and can reset it.
///
/// The client library allocates through this rather than through the
/// command surface: allocation is shared-memory bookkeeping, not a
/// hardware operation.
pub trait ArenaHost {
    fn arena(&self) -> Result<&Arena>;

    /// Reset the arena. Refused while descriptors still reference it.
    fn reset_arena(&self) -> Result<()>;
}
