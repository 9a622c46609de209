//! Counting semaphore on std::sync::Condvar
//!
//! Used on platforms without futex support.

use super::WorkerParking;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub struct FallbackParking {
    /// Available permits
    permits: Mutex<usize>,
    condvar: Condvar,
    parked: AtomicUsize,
}

impl FallbackParking {
    pub fn new() -> Self {
        Self {
            permits: Mutex::new(0),
            condvar: Condvar::new(),
            parked: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.permits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FallbackParking {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerParking for FallbackParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        let mut guard = self.lock();
        if *guard == 0 {
            self.parked.fetch_add(1, Ordering::SeqCst);
            guard = match timeout {
                Some(t) => {
                    self.condvar
                        .wait_timeout(guard, t)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .condvar
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
            };
            self.parked.fetch_sub(1, Ordering::SeqCst);
        }

        if *guard > 0 {
            *guard -= 1;
            true
        } else {
            false
        }
    }

    fn try_take(&self) -> bool {
        let mut guard = self.lock();
        if *guard > 0 {
            *guard -= 1;
            true
        } else {
            false
        }
    }

    fn post(&self) {
        {
            let mut guard = self.lock();
            *guard = guard.saturating_add(1);
        }
        self.condvar.notify_one();
    }

    fn wake_all(&self) {
        let _guard = self.lock();
        self.condvar.notify_all();
    }

    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }

    fn permits(&self) -> usize {
        *self.lock()
    }
}
