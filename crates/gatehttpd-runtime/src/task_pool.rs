//! Fixed pool of task slots
//!
//! Each slot owns a private arena carved once from a parent arena. A slot
//! is either free or leased to exactly one request. Claiming flips the
//! slot's busy flag with a compare-and-exchange, so two threads can never
//! lease the same slot. The lease opens a checkpoint on the slot's arena
//! and rolls it back on drop, so the next claimant always starts with an
//! empty arena.

use gatehttpd_core::error::MemoryError;
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::arena::{Arena, Checkpoint, TempMemory};

/// Re-check interval while blocked in `acquire`
const ACQUIRE_RECHECK: Duration = Duration::from_millis(50);

struct Slot {
    busy: AtomicBool,
    arena: Arena,
}

// The arena of a slot is only touched by the holder of its busy flag.
unsafe impl Sync for Slot {}

struct PoolInner {
    slots: Box<[Slot]>,
    lock: Mutex<()>,
    freed: Condvar,
}

impl PoolInner {
    fn claim(&self, index: usize) -> bool {
        self.slots[index]
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn any_free(&self) -> bool {
        self.slots.iter().any(|s| !s.busy.load(Ordering::Acquire))
    }
}

/// Cloneable handle to the pool
#[derive(Clone)]
pub struct TaskPool {
    inner: Arc<PoolInner>,
}

impl TaskPool {
    /// Carve `slots` arenas of `slot_size` bytes each from `parent`.
    pub fn new(parent: &Arena, slots: usize, slot_size: usize) -> Result<Self, MemoryError> {
        if slots == 0 || slot_size == 0 {
            return Err(MemoryError::InvalidSize);
        }
        let slots = (0..slots)
            .map(|_| {
                parent.carve(slot_size).map(|arena| Slot {
                    busy: AtomicBool::new(false),
                    arena,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                slots: slots.into_boxed_slice(),
                lock: Mutex::new(()),
                freed: Condvar::new(),
            }),
        })
    }

    /// Reserve a region big enough for the pool and carve it.
    pub fn with_capacity(slots: usize, slot_size: usize) -> Result<Self, MemoryError> {
        let total = slots.checked_mul(slot_size).ok_or(MemoryError::InvalidSize)?;
        let root = Arena::with_capacity(total)?;
        Self::new(&root, slots, slot_size)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }

    /// Slots currently leased (hint, may be stale)
    pub fn busy_count(&self) -> usize {
        self.inner
            .slots
            .iter()
            .filter(|s| s.busy.load(Ordering::Relaxed))
            .count()
    }

    /// Lease a free slot, or `None` when every slot is busy.
    pub fn try_acquire(&self) -> Option<TaskLease> {
        let index = (0..self.capacity()).find(|&i| self.inner.claim(i))?;
        let arena = &self.inner.slots[index].arena;
        debug_assert_eq!(arena.used(), 0, "slot {} leased with a dirty arena", index);
        let checkpoint = arena.open_checkpoint();

        Some(TaskLease {
            pool: Arc::clone(&self.inner),
            index,
            checkpoint: Some(checkpoint),
            _not_sync: PhantomData,
        })
    }

    /// Lease a slot, sleeping until one is released.
    pub fn acquire(&self) -> TaskLease {
        loop {
            if let Some(lease) = self.try_acquire() {
                return lease;
            }
            let guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
            if self.inner.any_free() {
                continue;
            }
            // A release between any_free() and the wait has to take the
            // lock to notify, so it cannot slip past us.
            let _ = self
                .inner
                .freed
                .wait_timeout(guard, ACQUIRE_RECHECK)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Exclusive lease on one task slot. Dropping it rolls the slot's arena
/// back to empty and frees the slot.
pub struct TaskLease {
    pool: Arc<PoolInner>,
    index: usize,
    checkpoint: Option<Checkpoint>,
    // Send to a worker, but never shared: the arena is !Sync
    _not_sync: PhantomData<Cell<()>>,
}

impl TaskLease {
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn arena(&self) -> &Arena {
        &self.pool.slots[self.index].arena
    }

    #[inline]
    fn depth(&self) -> usize {
        self.checkpoint.as_ref().map_or(0, |c| c.depth())
    }

    /// Allocate for the rest of the lease.
    #[allow(clippy::mut_from_ref)]
    pub fn push_size(&self, size: usize) -> Result<&mut [u8], MemoryError> {
        self.arena().push_at(self.depth(), size)
    }

    #[allow(clippy::mut_from_ref)]
    pub fn push_copy(&self, bytes: &[u8]) -> Result<&mut [u8], MemoryError> {
        let out = self.push_size(bytes.len())?;
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Open a nested scope on the slot's arena.
    pub fn begin_temp(&self) -> TempMemory<'_> {
        self.arena().begin_temp()
    }
}

impl Drop for TaskLease {
    fn drop(&mut self) {
        let slot = &self.pool.slots[self.index];
        if let Some(checkpoint) = self.checkpoint.take() {
            slot.arena.close_checkpoint(checkpoint);
        }
        debug_assert_eq!(slot.arena.used(), 0);
        debug_assert_eq!(slot.arena.open_checkpoints(), 0);

        slot.busy.store(false, Ordering::Release);
        let _guard = self.pool.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.pool.freed.notify_one();
    }
}

impl std::fmt::Debug for TaskLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLease")
            .field("index", &self.index)
            .field("arena", self.arena())
            .finish()
    }
}
