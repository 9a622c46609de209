//! Linux futex-based counting semaphore
//!
//! The futex word is the permit count. Parking waits while the word is 0;
//! `post` increments it and wakes one waiter. A post that races with a
//! worker about to sleep changes the word first, so FUTEX_WAIT returns
//! EAGAIN instead of sleeping.

use super::WorkerParking;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

pub struct FutexParking {
    /// Available permits
    permits: AtomicU32,

    /// Workers inside FUTEX_WAIT (or about to be)
    parked: AtomicUsize,
}

impl FutexParking {
    pub fn new() -> Self {
        Self {
            permits: AtomicU32::new(0),
            parked: AtomicUsize::new(0),
        }
    }

    fn futex_wake(&self, count: i32) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.permits.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                count,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexParking {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerParking for FutexParking {
    fn try_take(&self) -> bool {
        let mut current = self.permits.load(Ordering::SeqCst);
        while current > 0 {
            match self.permits.compare_exchange_weak(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    fn park(&self, timeout: Option<Duration>) -> bool {
        if self.try_take() {
            return true;
        }

        self.parked.fetch_add(1, Ordering::SeqCst);

        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs() as libc::time_t,
            tv_nsec: d.subsec_nanos() as libc::c_long,
        });
        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // Sleeps only while the count is still 0. ETIMEDOUT, EAGAIN and
        // EINTR all fall through to the re-check below.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.permits.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            );
        }

        self.parked.fetch_sub(1, Ordering::SeqCst);
        self.try_take()
    }

    fn post(&self) {
        // saturate instead of wrapping back to zero
        let _ = self
            .permits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |p| p.checked_add(1));
        if self.parked.load(Ordering::SeqCst) > 0 {
            self.futex_wake(1);
        }
    }

    fn wake_all(&self) {
        if self.parked.load(Ordering::SeqCst) > 0 {
            self.futex_wake(i32::MAX);
        }
    }

    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }

    fn permits(&self) -> usize {
        self.permits.load(Ordering::Relaxed) as usize
    }
}
