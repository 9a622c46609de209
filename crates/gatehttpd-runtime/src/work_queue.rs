//! Bounded work queue shared by the accept thread and the workers
//!
//! Items live in a fixed-capacity `ArrayQueue`; a successful `pop` hands an
//! item to exactly one thread, so every pushed item runs exactly once.
//! Every push posts one permit on the parking semaphore idle workers sleep
//! on.
//!
//! A full queue is never dropped: `push` makes the producer run queued
//! items itself until one fits.

use crossbeam_queue::ArrayQueue;
use gatehttpd_core::{kerror, ktrace};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::parking::{PlatformParking, WorkerParking};

/// One unit of deferred work, carrying its own context
pub struct WorkItem {
    job: Box<dyn FnOnce() + Send + 'static>,
}

impl WorkItem {
    pub fn new<F>(job: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { job: Box::new(job) }
    }

    /// Run the job. A panic is logged and reported as `false`; whatever
    /// the job owned has already been dropped by the unwind.
    pub fn run(self) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(self.job)) {
            Ok(()) => true,
            Err(_) => {
                kerror!("work item panicked");
                false
            }
        }
    }
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WorkItem")
    }
}

/// Queue counters
#[derive(Debug, Default)]
pub struct QueueStats {
    pub pushed: AtomicU64,
    pub completed: AtomicU64,
    pub panicked: AtomicU64,
    /// Items a producer ran itself because the queue was full
    pub helped: AtomicU64,
}

pub struct WorkQueue {
    items: ArrayQueue<WorkItem>,
    parking: PlatformParking,
    stats: QueueStats,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: ArrayQueue::new(capacity.max(1)),
            parking: PlatformParking::new(),
            stats: QueueStats::default(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Queue `item`, or hand it back if the queue is full.
    pub fn try_push(&self, item: WorkItem) -> Result<(), WorkItem> {
        self.items.push(item)?;
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        self.parking.post();
        Ok(())
    }

    /// Queue `item`, running queued items on this thread while full.
    pub fn push(&self, mut item: WorkItem) {
        loop {
            match self.try_push(item) {
                Ok(()) => return,
                Err(back) => {
                    item = back;
                    ktrace!("work queue full ({} items), helping", self.capacity());
                    if self.run_one() {
                        self.stats.helped.fetch_add(1, Ordering::Relaxed);
                    } else {
                        std::thread::yield_now();
                    }
                }
            }
        }
    }

    /// Convenience wrapper around `push`.
    pub fn enqueue<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(WorkItem::new(job));
    }

    /// Take the oldest item; only one caller ever gets a given item.
    ///
    /// The item's wake-up permit is taken with it, so items drained by a
    /// helping producer do not leave wake-ups behind for idle workers.
    #[inline]
    pub fn claim(&self) -> Option<WorkItem> {
        let item = self.items.pop()?;
        self.parking.try_take();
        Some(item)
    }

    /// Claim and run one item. Returns `false` if the queue was empty.
    pub fn run_one(&self) -> bool {
        match self.claim() {
            Some(item) => {
                if item.run() {
                    self.stats.completed.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.stats.panicked.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
            None => false,
        }
    }

    /// Sleep until an item is posted or `timeout` passes.
    #[inline]
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        self.parking.park(timeout)
    }

    /// Wake every sleeping worker (shutdown).
    pub fn wake_all(&self) {
        self.parking.wake_all();
    }

    /// Workers currently asleep
    #[inline]
    pub fn sleeping(&self) -> usize {
        self.parking.parked_count()
    }

    /// Wake-ups posted and not yet taken
    #[inline]
    pub fn pending_wakeups(&self) -> usize {
        self.parking.permits()
    }
}
