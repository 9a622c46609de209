//! Bump arena with stacked checkpoints
//!
//! An `Arena` owns a byte range of a [`MemoryRegion`] and hands out memory
//! by bumping an offset. Nothing is freed individually. Instead, memory is
//! allocated inside a checkpoint scope ([`TempMemory`], or the checkpoint
//! a [`TaskLease`](crate::task_pool::TaskLease) holds) and closing the
//! scope rolls the offset back to where it was when the scope opened.
//!
//! ```text
//! arena: [ carved slot 0 | carved slot 1 | ... | scope 1 | scope 2 |  free  ]
//!                                               ^mark 1   ^mark 2   ^used
//! ```
//!
//! Rules, checked at runtime:
//!
//! - scopes close in reverse open order (a violation panics)
//! - only the innermost open scope may allocate (a violation panics)
//! - permanent carving (`carve`) is refused while any scope is open
//!
//! Slices returned from a scope borrow that scope, so the borrow checker
//! keeps them from outliving the rollback.

use gatehttpd_core::error::MemoryError;
use std::cell::Cell;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::memory::MemoryRegion;

pub struct Arena {
    base: NonNull<u8>,
    capacity: usize,
    used: Cell<usize>,
    open: Cell<usize>,
    _backing: Arc<MemoryRegion>,
}

// An arena owns its byte range exclusively. Cell keeps it !Sync.
unsafe impl Send for Arena {}

/// Position saved when a scope opens
pub(crate) struct Checkpoint {
    mark: usize,
    depth: usize,
}

impl Checkpoint {
    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }
}

impl Arena {
    /// Arena spanning a whole region.
    pub fn from_region(region: MemoryRegion) -> Self {
        let base = NonNull::new(region.as_ptr()).unwrap_or(NonNull::dangling());
        Self {
            base,
            capacity: region.len(),
            used: Cell::new(0),
            open: Cell::new(0),
            _backing: Arc::new(region),
        }
    }

    /// Reserve a fresh region of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, MemoryError> {
        MemoryRegion::reserve(capacity).map(Self::from_region)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used.get()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.used.get()
    }

    #[inline]
    pub fn open_checkpoints(&self) -> usize {
        self.open.get()
    }

    /// Permanently split off `size` bytes as an independent arena.
    pub fn carve(&self, size: usize) -> Result<Arena, MemoryError> {
        if self.open.get() != 0 {
            return Err(MemoryError::CheckpointOpen);
        }
        let start = self.bump(size)?;
        Ok(Arena {
            base: start,
            capacity: size,
            used: Cell::new(0),
            open: Cell::new(0),
            _backing: Arc::clone(&self._backing),
        })
    }

    /// Open a checkpoint scope.
    pub fn begin_temp(&self) -> TempMemory<'_> {
        TempMemory {
            arena: self,
            checkpoint: Some(self.open_checkpoint()),
        }
    }

    pub(crate) fn open_checkpoint(&self) -> Checkpoint {
        let depth = self.open.get() + 1;
        self.open.set(depth);
        Checkpoint {
            mark: self.used.get(),
            depth,
        }
    }

    pub(crate) fn close_checkpoint(&self, checkpoint: Checkpoint) {
        assert_eq!(
            self.open.get(),
            checkpoint.depth,
            "arena checkpoint closed out of order"
        );
        debug_assert!(checkpoint.mark <= self.used.get());
        self.used.set(checkpoint.mark);
        self.open.set(checkpoint.depth - 1);
    }

    /// Allocate on behalf of the scope at `depth`.
    #[allow(clippy::mut_from_ref)]
    pub(crate) fn push_at(&self, depth: usize, size: usize) -> Result<&mut [u8], MemoryError> {
        assert_eq!(
            self.open.get(),
            depth,
            "allocation from an arena scope that is not innermost"
        );
        let start = self.bump(size)?;
        // SAFETY: bump() hands out each byte range once until a rollback,
        // and the returned slice borrows the scope that performs the rollback.
        Ok(unsafe { std::slice::from_raw_parts_mut(start.as_ptr(), size) })
    }

    fn bump(&self, size: usize) -> Result<NonNull<u8>, MemoryError> {
        let used = self.used.get();
        let remaining = self.capacity - used;
        if size > remaining {
            return Err(MemoryError::OutOfMemory {
                requested: size,
                remaining,
            });
        }
        self.used.set(used + size);
        // SAFETY: used + size <= capacity, so the offset stays inside the range
        Ok(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(used)) })
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity)
            .field("used", &self.used.get())
            .field("open", &self.open.get())
            .finish()
    }
}

/// Checkpoint scope. Everything pushed through it is released on drop.
pub struct TempMemory<'a> {
    arena: &'a Arena,
    checkpoint: Option<Checkpoint>,
}

impl<'a> TempMemory<'a> {
    #[inline]
    fn depth(&self) -> usize {
        self.checkpoint.as_ref().map_or(0, |c| c.depth)
    }

    /// Bump-allocate `size` bytes (contents are whatever the last user left).
    #[allow(clippy::mut_from_ref)]
    pub fn push_size(&self, size: usize) -> Result<&mut [u8], MemoryError> {
        self.arena.push_at(self.depth(), size)
    }

    /// Allocate and fill with `bytes`.
    #[allow(clippy::mut_from_ref)]
    pub fn push_copy(&self, bytes: &[u8]) -> Result<&mut [u8], MemoryError> {
        let out = self.push_size(bytes.len())?;
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Open a nested scope.
    pub fn begin_temp(&self) -> TempMemory<'_> {
        self.arena.begin_temp()
    }

    /// Bytes still available to this scope.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.arena.remaining()
    }

    #[inline]
    pub fn arena(&self) -> &'a Arena {
        self.arena
    }
}

impl Drop for TempMemory<'_> {
    fn drop(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            self.arena.close_checkpoint(checkpoint);
        }
    }
}
