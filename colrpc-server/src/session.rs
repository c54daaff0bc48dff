//! Per-connection bookkeeping.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// State kept for one accepted connection.
#[derive(Debug)]
pub struct Session {
    /// Process-unique session ID.
    pub id: u64,

    /// Remote address.
    pub remote_addr: SocketAddr,

    /// Messages processed on this connection.
    request_count: u64,

    /// Session creation time.
    created_at: Instant,

    /// Last time a complete message arrived.
    last_activity: Instant,
}

impl Session {
    /// Creates a new session.
    pub fn new(remote_addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            remote_addr,
            request_count: 0,
            created_at: now,
            last_activity: now,
        }
    }

    /// Records a processed message.
    pub fn record_request(&mut self) {
        self.request_count += 1;
        self.last_activity = Instant::now();
    }

    /// Returns the number of messages processed.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Returns how long the connection has been open.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Returns the time since the last message.
    pub fn idle_duration(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:12345".parse().unwrap()
    }

    #[test]
    fn test_session_creation() {
        let session = Session::new(test_addr());
        assert_eq!(session.remote_addr, test_addr());
        assert_eq!(session.request_count(), 0);
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = Session::new(test_addr());
        let b = Session::new(test_addr());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_record_request() {
        let mut session = Session::new(test_addr());
        std::thread::sleep(Duration::from_millis(5));
        let idle_before = session.idle_duration();

        session.record_request();
        session.record_request();

        assert_eq!(session.request_count(), 2);
        assert!(session.idle_duration() < idle_before);
    }
}
