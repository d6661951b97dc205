//! Token-bucket-free byte-rate throttling, built on plain atomics: no locks
//! on the hot path, a `watch` channel only for the limit
//! itself since that changes rarely (a user flipping a setting) while bytes
//! move constantly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::common::config::UNLIMITED_RATE_BYTES_PER_SEC;

/// One throttled direction (upload or download), shared across every
/// concurrent transfer of that direction.
pub struct ThrottleGroup {
    limit_bytes_per_sec: watch::Sender<u64>,
    window_start: AtomicU64,
    window_bytes: AtomicU64,
    epoch: Instant,
}

impl ThrottleGroup {
    pub fn new(initial_limit_bytes_per_sec: u64) -> Arc<Self> {
        let (tx, _rx) = watch::channel(initial_limit_bytes_per_sec);
        Arc::new(Self {
            limit_bytes_per_sec: tx,
            window_start: AtomicU64::new(0),
            window_bytes: AtomicU64::new(0),
            epoch: Instant::now(),
        })
    }

    pub fn unlimited() -> Arc<Self> {
        Self::new(UNLIMITED_RATE_BYTES_PER_SEC)
    }

    pub fn set_limit_bytes_per_sec(&self, limit: u64) {
        let _ = self.limit_bytes_per_sec.send(limit);
    }

    pub fn limit_bytes_per_sec(&self) -> u64 {
        *self.limit_bytes_per_sec.borrow()
    }

    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Account for `bytes` just transferred, sleeping if this second's
    /// window has already used its budget. One-second sliding windows,
    /// reset wholesale rather than smoothed, matching the progress
    /// tracker's own per-second counters.
    async fn account(&self, bytes: u64) {
        let limit = self.limit_bytes_per_sec();
        if limit == 0 {
            return;
        }

        let now = self.now_millis();
        let window_start = self.window_start.load(Ordering::Relaxed);
        if now.saturating_sub(window_start) >= 1000 {
            self.window_start.store(now, Ordering::Relaxed);
            self.window_bytes.store(0, Ordering::Relaxed);
        }

        let used = self.window_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if used > limit {
            let window_start = self.window_start.load(Ordering::Relaxed);
            let elapsed = self.now_millis().saturating_sub(window_start);
            let wait_ms = 1000u64.saturating_sub(elapsed);
            if wait_ms > 0 {
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            }
        }
    }
}

/// Per-transfer handle into a shared group's budget.
pub struct ThrottleHandle {
    group: Arc<ThrottleGroup>,
}

impl ThrottleHandle {
    pub fn new(group: Arc<ThrottleGroup>) -> Self {
        Self { group }
    }

    /// Call after each chunk send/receive with the byte count just moved.
    pub async fn throttle(&self, bytes: u64) {
        self.group.account(bytes).await;
    }

    pub fn limit_bytes_per_sec(&self) -> u64 {
        self.group.limit_bytes_per_sec()
    }
}
