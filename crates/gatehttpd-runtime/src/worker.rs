//! Background worker threads
//!
//! Workers drain the shared [`WorkQueue`] and sleep on its semaphore when
//! it is empty. The accept thread is not part of the pool; it only helps
//! when the pool is saturated.

use gatehttpd_core::error::WorkerError;
use gatehttpd_core::{kdebug, kerror};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::work_queue::WorkQueue;

/// Upper bound on a parked worker noticing shutdown without a wake
const PARK_TIMEOUT: Duration = Duration::from_millis(100);

struct Shared {
    queue: Arc<WorkQueue>,
    shutdown: AtomicBool,
    started: AtomicUsize,
}

/// Pool of worker threads
pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `num_workers` threads named `gate-worker-{i}`.
    pub fn start(num_workers: usize, queue: Arc<WorkQueue>) -> Result<Self, WorkerError> {
        let shared = Arc::new(Shared {
            queue,
            shutdown: AtomicBool::new(false),
            started: AtomicUsize::new(0),
        });

        let mut pool = Self {
            shared,
            handles: Vec::with_capacity(num_workers),
        };

        for i in 0..num_workers {
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(format!("gate-worker-{}", i))
                .spawn(move || worker_loop(shared));

            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    kerror!("failed to spawn worker {}: {}", i, e);
                    pool.shutdown();
                    let _ = pool.join();
                    return Err(WorkerError::SpawnFailed);
                }
            }
        }

        Ok(pool)
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    /// Workers that have entered their loop
    #[inline]
    pub fn started(&self) -> usize {
        self.shared.started.load(Ordering::Acquire)
    }

    #[inline]
    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.shared.queue
    }

    /// Ask workers to exit once the queue is drained.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.queue.wake_all();
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Wait for every worker to exit.
    pub fn join(&mut self) -> Result<(), WorkerError> {
        let mut result = Ok(());
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                result = Err(WorkerError::Panicked);
            }
        }
        result
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.shutdown();
            let _ = self.join();
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    shared.started.fetch_add(1, Ordering::AcqRel);
    kdebug!("worker started");

    loop {
        if shared.queue.run_one() {
            continue;
        }
        // Drain before exiting so no accepted connection is abandoned
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        shared.queue.wait(Some(PARK_TIMEOUT));
    }

    kdebug!("worker exiting");
}
