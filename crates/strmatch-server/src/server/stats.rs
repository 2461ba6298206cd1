//! Query performance counters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct ResponseTimes {
    count: u64,
    avg_ms: f64,
}

/// Counters shared by every connection task.
#[derive(Debug, Default)]
pub struct ServerStats {
    times: Mutex<ResponseTimes>,
    active: AtomicUsize,
    max_concurrent: AtomicUsize,
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub total_queries: u64,
    pub avg_response_ms: f64,
    pub active_connections: usize,
    pub max_concurrent: usize,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a connection as active until the returned guard is dropped.
    pub fn connection_opened(self: &Arc<Self>) -> ConnectionGuard {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(active, Ordering::SeqCst);
        ConnectionGuard {
            stats: Arc::clone(self),
        }
    }

    /// Fold one search duration into the running average. Rejected or
    /// failed requests are not recorded.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_query(&self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let mut times = self.times.lock().unwrap_or_else(PoisonError::into_inner);
        times.count += 1;
        times.avg_ms += (ms - times.avg_ms) / times.count as f64;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let times = self.times.lock().unwrap_or_else(PoisonError::into_inner);
        StatsSnapshot {
            total_queries: times.count,
            avg_response_ms: times.avg_ms,
            active_connections: self.active.load(Ordering::SeqCst),
            max_concurrent: self.max_concurrent.load(Ordering::SeqCst),
        }
    }
}

/// Decrements the active connection count on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    stats: Arc<ServerStats>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn average_is_running_mean() {
        let stats = ServerStats::new();
        stats.record_query(Duration::from_millis(10));
        stats.record_query(Duration::from_millis(20));
        stats.record_query(Duration::from_millis(30));

        let snap = stats.snapshot();
        assert_eq!(snap.total_queries, 3);
        assert!((snap.avg_response_ms - 20.0).abs() < 1e-6, "{snap:?}");
    }

    #[test]
    fn guards_track_active_and_peak() {
        let stats = Arc::new(ServerStats::new());
        let a = stats.connection_opened();
        let b = stats.connection_opened();
        assert_eq!(stats.snapshot().active_connections, 2);

        drop(a);
        let c = stats.connection_opened();
        drop(b);
        drop(c);

        let snap = stats.snapshot();
        assert_eq!(snap.active_connections, 0);
        assert_eq!(snap.max_concurrent, 2);
    }

    #[test]
    fn empty_snapshot_is_zeroed() {
        let snap = ServerStats::new().snapshot();
        assert_eq!(snap.total_queries, 0);
        assert!(snap.avg_response_ms.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn concurrent_recording_counts_every_query() {
        let stats = Arc::new(ServerStats::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(tokio::spawn(async move {
                let _guard = stats.connection_opened();
                for _ in 0..100 {
                    stats.record_query(Duration::from_micros(500));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let snap = stats.snapshot();
        assert_eq!(snap.total_queries, 800);
        assert_eq!(snap.active_connections, 0);
        assert!(snap.max_concurrent >= 1);
    }
}
