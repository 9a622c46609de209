//! Worker parking
//!
//! A counting semaphore idle workers sleep on. Each queued work item posts
//! one permit and every claimed item takes one back, so permits track the
//! queue length instead of growing with every burst. A parked worker wakes
//! when a permit is available and goes looking for work; workers always
//! re-check the queue after waking, so losing a permit to a claimant only
//! costs one empty check.

use std::time::Duration;

pub trait WorkerParking: Send + Sync {
    /// Take a permit, sleeping up to `timeout` for one to arrive.
    ///
    /// Returns `true` if a permit was taken. A `false` return (timeout,
    /// `wake_all`, spurious wakeup) still means "re-check for work".
    fn park(&self, timeout: Option<Duration>) -> bool;

    /// Take a permit if one is available, never sleeping.
    fn try_take(&self) -> bool;

    /// Add one permit and wake one parked worker.
    fn post(&self);

    /// Wake every parked worker without adding permits (shutdown).
    fn wake_all(&self);

    /// Number of currently parked workers (hint, may be stale)
    fn parked_count(&self) -> usize;

    /// Permits not yet taken (hint, may be stale)
    fn permits(&self) -> usize;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParking as PlatformParking;
    } else {
        mod fallback;
        pub use fallback::FallbackParking as PlatformParking;
    }
}

/// Create a new platform-appropriate parking instance
pub fn new_parking() -> Box<dyn WorkerParking> {
    Box::new(PlatformParking::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_park_timeout() {
        let parking = new_parking();
        let start = Instant::now();
        let took = parking.park(Some(Duration::from_millis(50)));
        assert!(!took);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_posted_permit_is_not_lost() {
        let parking = new_parking();
        parking.post();
        parking.post();
        assert_eq!(parking.permits(), 2);
        assert!(parking.park(Some(Duration::from_millis(10))));
        assert!(parking.park(Some(Duration::from_millis(10))));
        assert!(!parking.park(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_try_take_never_sleeps() {
        let parking = new_parking();
        assert!(!parking.try_take());
        parking.post();
        assert!(parking.try_take());
        assert_eq!(parking.permits(), 0);
    }

    #[test]
    fn test_post_wakes_parked_worker() {
        let parking = Arc::new(PlatformParking::new());
        let parking2 = Arc::clone(&parking);

        let handle = thread::spawn(move || {
            let start = Instant::now();
            while start.elapsed() < Duration::from_secs(10) {
                if parking2.park(Some(Duration::from_secs(10))) {
                    return true;
                }
            }
            false
        });

        thread::sleep(Duration::from_millis(50));
        parking.post();
        assert!(handle.join().unwrap());
        assert_eq!(parking.permits(), 0);
    }

    #[test]
    fn test_wake_all_releases_everyone() {
        let parking = Arc::new(PlatformParking::new());
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let p = Arc::clone(&parking);
                thread::spawn(move || {
                    let start = Instant::now();
                    p.park(Some(Duration::from_secs(10)));
                    start.elapsed()
                })
            })
            .collect();

        let start = Instant::now();
        while parking.parked_count() < 3 && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        // the futex wait itself may not have started yet
        thread::sleep(Duration::from_millis(20));
        parking.wake_all();
        for h in handles {
            assert!(h.join().unwrap() < Duration::from_secs(5));
        }
    }
}
