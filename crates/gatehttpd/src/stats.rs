//! Server counters

use gatehttpd_core::kinfo;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::response::Status;

#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections: AtomicU64,
    pub ok: AtomicU64,
    pub bad_request: AtomicU64,
    pub unauthorized: AtomicU64,
    pub forbidden: AtomicU64,
    pub not_found: AtomicU64,
    /// Connections closed before a request arrived
    pub empty: AtomicU64,
    /// Receive or send failures
    pub transport_errors: AtomicU64,
    /// Requests dropped because the task arena ran out
    pub memory_errors: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, status: Status) {
        let counter = match status {
            Status::Ok => &self.ok,
            Status::BadRequest => &self.bad_request,
            Status::Unauthorized => &self.unauthorized,
            Status::Forbidden => &self.forbidden,
            Status::NotFound => &self.not_found,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Responses sent, all statuses
    pub fn responses(&self) -> u64 {
        [
            &self.ok,
            &self.bad_request,
            &self.unauthorized,
            &self.forbidden,
            &self.not_found,
        ]
        .iter()
        .map(|c| c.load(Ordering::Relaxed))
        .sum()
    }

    pub fn print(&self) {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        kinfo!(
            "connections={} responses={} (200={} 400={} 401={} 403={} 404={})",
            load(&self.connections),
            self.responses(),
            load(&self.ok),
            load(&self.bad_request),
            load(&self.unauthorized),
            load(&self.forbidden),
            load(&self.not_found),
        );
        kinfo!(
            "empty={} transport_errors={} memory_errors={}",
            load(&self.empty),
            load(&self.transport_errors),
            load(&self.memory_errors),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let stats = ServerStats::new();
        stats.record(Status::Ok);
        stats.record(Status::Ok);
        stats.record(Status::Forbidden);
        assert_eq!(stats.ok.load(Ordering::Relaxed), 2);
        assert_eq!(stats.forbidden.load(Ordering::Relaxed), 1);
        assert_eq!(stats.responses(), 3);
    }
}
