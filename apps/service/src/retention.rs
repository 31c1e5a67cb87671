//! Automatic retention of aggregated buckets.
//!
//! The store never forgets on its own. When `[retention] keep_minutes` is set
//! a background task periodically removes every bucket older than that
//! window.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use netpulse::{AggregateStore, BucketKey, Clock, Storable, SystemClock};
use tracing::{debug, info, warn};

use crate::config::Retention;

/// Retention policy for aggregated buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Minutes of buckets to keep, counting back from the current minute
    pub keep_minutes: u32,
    /// Seconds between two cleanup passes
    pub cleanup_interval_seconds: u64,
}

impl RetentionPolicy {
    /// `None` when retention is not configured.
    pub fn from_config(config: &Retention) -> Option<Self> {
        config.keep_minutes.map(|keep_minutes| Self {
            keep_minutes,
            cleanup_interval_seconds: config.cleanup_interval_seconds.max(1),
        })
    }

    fn window(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.keep_minutes))
    }
}

/// Cleanup manager for expired buckets
pub struct RetentionCleanup {
    store: Arc<AggregateStore>,
    clock: Arc<dyn Clock>,
    policy: RetentionPolicy,
}

impl RetentionCleanup {
    pub fn new(store: Arc<AggregateStore>, policy: RetentionPolicy) -> Self {
        Self { store, clock: Arc::new(SystemClock), policy }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Remove every bucket older than the window; returns how many went.
    pub fn cleanup_expired_buckets(&self) -> usize {
        let cutoff = BucketKey::now(self.clock.as_ref()).minute() - self.policy.window();
        let mut removed = 0;

        for bucket in self.store.buckets().into_iter().take_while(|b| b.minute() < cutoff) {
            match self.store.remove(&bucket.to_string()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(%bucket, error = %e, "failed to remove expired bucket"),
            }
        }

        if removed > 0 {
            info!(removed, remaining = self.store.len(), "retention cleanup completed");
        } else {
            debug!("retention cleanup found nothing to remove");
        }
        removed
    }

    /// Start the background cleanup task
    pub fn start_periodic_cleanup(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(self.policy.cleanup_interval_seconds));
            loop {
                interval.tick().await;
                self.cleanup_expired_buckets();
            }
        })
    }
}
