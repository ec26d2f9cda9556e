//! Transient bootstrap memory
//!
//! The bootstrap stages a handful of byte buffers (shader text, file
//! contents) whose lifetimes all end when bring-up finishes. Rather than
//! scatter small heap allocations, they come out of one fixed-size bump
//! arena that is reclaimed as a whole.

use thiserror::Error;

/// Alignment applied to every allocation, in bytes.
const SCRATCH_ALIGN: usize = 16;

/// Scratch allocator errors
#[derive(Error, Debug)]
pub enum MemoryError {
    /// The arena was created with no backing capacity
    #[error("scratch allocator capacity must be non-zero")]
    ZeroCapacity,
}

/// An allocation handed out by [`ScratchAllocator`].
///
/// Blocks are offset ranges into the arena rather than borrowed slices, so
/// several allocations can be alive at once; resolve them through
/// [`ScratchAllocator::bytes`] / [`ScratchAllocator::bytes_mut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchBlock {
    offset: usize,
    len: usize,
}

impl ScratchBlock {
    /// Byte offset of this block inside the arena.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Requested (unrounded) length of this block in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the block is zero-sized.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Linear (bump) allocator over one fixed, zero-initialized block.
///
/// There is no per-allocation free; `used` only grows until [`reset`]
/// reclaims the whole arena.
///
/// [`reset`]: ScratchAllocator::reset
pub struct ScratchAllocator {
    storage: Box<[u8]>,
    used: usize,
}

impl ScratchAllocator {
    /// Create an arena backed by `capacity` zeroed bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, MemoryError> {
        if capacity == 0 {
            return Err(MemoryError::ZeroCapacity);
        }

        Ok(Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        })
    }

    /// Bump-allocate `size` bytes, rounded up to the arena alignment.
    ///
    /// Returns `None` when the rounded request exceeds the remaining
    /// capacity; `used` is left untouched by a failed call.
    pub fn alloc(&mut self, size: usize) -> Option<ScratchBlock> {
        let rounded = (size + (SCRATCH_ALIGN - 1)) & !(SCRATCH_ALIGN - 1);

        if self.used + rounded > self.storage.len() {
            log::error!(
                "scratch allocator exhausted: requested {} bytes ({} rounded), {} of {} in use",
                size,
                rounded,
                self.used,
                self.storage.len()
            );
            return None;
        }

        let block = ScratchBlock {
            offset: self.used,
            len: size,
        };
        self.used += rounded;
        Some(block)
    }

    /// Read access to a previously allocated block.
    pub fn bytes(&self, block: ScratchBlock) -> &[u8] {
        &self.storage[block.offset..block.offset + block.len]
    }

    /// Write access to a previously allocated block.
    pub fn bytes_mut(&mut self, block: ScratchBlock) -> &mut [u8] {
        &mut self.storage[block.offset..block.offset + block.len]
    }

    /// Reclaim the whole arena. Outstanding [`ScratchBlock`]s are invalidated.
    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes currently in use (rounded offsets included).
    pub fn used(&self) -> usize {
        self.used
    }

    /// Address of the backing block, for handle bookkeeping.
    pub fn base_addr(&self) -> usize {
        self.storage.as_ptr() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_an_error() {
        assert!(matches!(
            ScratchAllocator::with_capacity(0),
            Err(MemoryError::ZeroCapacity)
        ));
    }

    #[test]
    fn test_offsets_follow_rounded_sizes() {
        let mut scratch = ScratchAllocator::with_capacity(1024).unwrap();

        let a = scratch.alloc(10).unwrap();
        assert_eq!(a.offset(), 0);
        assert_eq!(scratch.used(), 16);

        let b = scratch.alloc(20).unwrap();
        assert_eq!(b.offset(), 16);
        assert_eq!(scratch.used(), 48);

        assert!(scratch.alloc(2000).is_none());
        assert_eq!(scratch.used(), 48);
    }

    #[test]
    fn test_blocks_never_overlap() {
        let mut scratch = ScratchAllocator::with_capacity(256).unwrap();
        let sizes = [1, 16, 17, 32, 5];

        let blocks: Vec<ScratchBlock> =
            sizes.iter().map(|&s| scratch.alloc(s).unwrap()).collect();

        for (i, a) in blocks.iter().enumerate() {
            for b in blocks.iter().skip(i + 1) {
                let a_end = a.offset() + a.len();
                assert!(a_end <= b.offset(), "blocks {:?} and {:?} overlap", a, b);
            }
        }
    }

    #[test]
    fn test_exact_fit_succeeds() {
        let mut scratch = ScratchAllocator::with_capacity(32).unwrap();
        assert!(scratch.alloc(32).is_some());
        assert_eq!(scratch.used(), 32);
        assert!(scratch.alloc(1).is_none());
    }

    #[test]
    fn test_writes_are_visible_through_reads() {
        let mut scratch = ScratchAllocator::with_capacity(64).unwrap();
        let block = scratch.alloc(4).unwrap();

        scratch.bytes_mut(block).copy_from_slice(b"glsl");
        assert_eq!(scratch.bytes(block), b"glsl");
    }

    #[test]
    fn test_reset_reclaims_everything() {
        let mut scratch = ScratchAllocator::with_capacity(64).unwrap();
        scratch.alloc(40).unwrap();
        assert!(scratch.alloc(40).is_none());

        scratch.reset();
        assert_eq!(scratch.used(), 0);
        assert!(scratch.alloc(40).is_some());
    }
}
