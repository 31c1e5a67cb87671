//! In-memory aggregate of poll results.
//!
//! Layout: `bucket -> worker -> address -> reachable`. Writes deep-merge into
//! the existing entry, so a later result overwrites the addresses it carries
//! and leaves the others alone. Buckets are created on first write and only
//! go away through [`Storable::remove`].
//!
//! Each mutation happens under a single write lock with no await point, so a
//! merge is atomic with respect to every other task and to the query path.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, trace};

use crate::bucket::BucketKey;
use crate::bus::Observer;
use crate::error::StoreError;
use crate::result::{PollResult, Reachability};

/// Worker name -> reachability, for one bucket.
pub type WorkerMap = BTreeMap<String, Reachability>;

/// The whole store, oldest bucket first.
pub type Snapshot = BTreeMap<BucketKey, WorkerMap>;

/// Whatever a key resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Lookup {
    Store(Snapshot),
    Bucket(WorkerMap),
    Worker(Reachability),
    Reachable(bool),
}

/// Merge-only storage for poll results.
pub trait Storable: Send + Sync {
    /// Deep-merge `data` into `bucket/worker`.
    fn add(&self, bucket: BucketKey, worker: &str, data: &Reachability);

    /// Delete a whole bucket.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// `None` returns everything; a key returns the first pre-order match at
    /// any depth.
    fn get(&self, key: Option<&str>) -> Option<Lookup>;
}

#[derive(Debug, Default)]
pub struct AggregateStore {
    buckets: RwLock<Snapshot>,
}

/// Keys arrive from URLs, sometimes still quoted.
fn normalize_key(key: &str) -> String {
    key.replace('\'', "")
}

fn find(tree: &Snapshot, key: &str) -> Option<Lookup> {
    for (bucket, workers) in tree {
        if bucket.to_string() == key {
            return Some(Lookup::Bucket(workers.clone()));
        }
        for (worker, reachability) in workers {
            if worker == key {
                return Some(Lookup::Worker(reachability.clone()));
            }
            if let Some(alive) = reachability.get(key) {
                return Some(Lookup::Reachable(*alive));
            }
        }
    }
    None
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.buckets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }

    /// Bucket keys, oldest first.
    pub fn buckets(&self) -> Vec<BucketKey> {
        self.buckets.read().keys().copied().collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.buckets.read().clone()
    }
}

impl Storable for AggregateStore {
    fn add(&self, bucket: BucketKey, worker: &str, data: &Reachability) {
        let mut buckets = self.buckets.write();
        let entry = buckets.entry(bucket).or_default().entry(worker.to_string()).or_default();
        entry.extend(data.iter().map(|(address, alive)| (address.clone(), *alive)));
        trace!(%bucket, worker, addresses = data.len(), "merged poll result");
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let key = normalize_key(key);
        let bucket: BucketKey = key.parse().map_err(|_| StoreError::BucketNotFound(key.clone()))?;
        match self.buckets.write().remove(&bucket) {
            Some(_) => {
                debug!(%bucket, "bucket removed");
                Ok(())
            }
            None => Err(StoreError::BucketNotFound(key)),
        }
    }

    fn get(&self, key: Option<&str>) -> Option<Lookup> {
        let buckets = self.buckets.read();
        match key {
            None => Some(Lookup::Store(buckets.clone())),
            Some(key) => find(&buckets, &normalize_key(key)),
        }
    }
}

/// Writes every result it observes into a [`Storable`].
pub struct StoreSink {
    store: Arc<dyn Storable>,
}

impl StoreSink {
    pub fn new(store: Arc<dyn Storable>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Observer for StoreSink {
    async fn update(&self, result: &PollResult) -> Result<()> {
        self.store.add(result.bucket(), result.worker(), result.reachability());
        Ok(())
    }

    fn name(&self) -> &str {
        "store"
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn bucket(minute: u32) -> BucketKey {
        BucketKey::from_datetime(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(10, minute, 0).unwrap(),
        )
    }

    fn reach(pairs: &[(&str, bool)]) -> Reachability {
        pairs.iter().map(|(a, b)| (a.to_string(), *b)).collect()
    }

    #[test]
    fn add_creates_levels_lazily() {
        let store = AggregateStore::new();
        assert!(store.is_empty());
        store.add(bucket(1), "W1", &reach(&[("10.1", true)]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(Some("W1")), Some(Lookup::Worker(reach(&[("10.1", true)]))));
    }

    #[test]
    fn merge_keeps_untouched_addresses() {
        let store = AggregateStore::new();
        store.add(bucket(1), "W1", &reach(&[("a", true)]));
        store.add(bucket(1), "W1", &reach(&[("b", false)]));
        assert_eq!(
            store.get(Some("W1")),
            Some(Lookup::Worker(reach(&[("a", true), ("b", false)])))
        );
    }

    #[test]
    fn later_write_wins() {
        let store = AggregateStore::new();
        store.add(bucket(1), "W1", &reach(&[("a", true)]));
        store.add(bucket(1), "W1", &reach(&[("a", false)]));
        assert_eq!(store.get(Some("a")), Some(Lookup::Reachable(false)));
    }

    #[test]
    fn identical_writes_are_idempotent() {
        let once = AggregateStore::new();
        let twice = AggregateStore::new();
        let data = reach(&[("a", true), ("b", false)]);
        once.add(bucket(2), "W2", &data);
        twice.add(bucket(2), "W2", &data);
        twice.add(bucket(2), "W2", &data);
        assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn lookup_finds_buckets_by_rendered_key() {
        let store = AggregateStore::new();
        store.add(bucket(3), "W1", &reach(&[("a", true)]));
        let key = bucket(3).to_string();
        assert!(matches!(store.get(Some(key.as_str())), Some(Lookup::Bucket(w)) if w.contains_key("W1")));
    }

    #[test]
    fn lookup_returns_the_oldest_match_first() {
        let store = AggregateStore::new();
        store.add(bucket(5), "W1", &reach(&[("a", false)]));
        store.add(bucket(4), "W1", &reach(&[("a", true)]));
        assert_eq!(store.get(Some("a")), Some(Lookup::Reachable(true)));
    }

    #[test]
    fn lookup_strips_quotes_and_misses_cleanly() {
        let store = AggregateStore::new();
        store.add(bucket(1), "W1", &reach(&[("10.0.0.1", true)]));
        assert_eq!(store.get(Some("'10.0.0.1'")), Some(Lookup::Reachable(true)));
        assert_eq!(store.get(Some("10.0.0.2")), None);
    }

    #[test]
    fn get_without_key_returns_everything() {
        let store = AggregateStore::new();
        store.add(bucket(1), "W1", &reach(&[("a", true)]));
        store.add(bucket(2), "W2", &reach(&[("b", true)]));
        match store.get(None) {
            Some(Lookup::Store(all)) => assert_eq!(all.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn remove_deletes_a_bucket() {
        let store = AggregateStore::new();
        store.add(bucket(1), "W1", &reach(&[("a", true)]));
        store.add(bucket(2), "W1", &reach(&[("a", true)]));
        store.remove(&bucket(1).to_string()).unwrap();
        assert_eq!(store.buckets(), vec![bucket(2)]);
    }

    #[test]
    fn remove_of_a_missing_bucket_is_not_found() {
        let store = AggregateStore::new();
        assert_eq!(
            store.remove("1.1.2024 0.0"),
            Err(StoreError::BucketNotFound("1.1.2024 0.0".into()))
        );
        assert!(matches!(store.remove("W1"), Err(StoreError::BucketNotFound(_))));
    }

    #[test]
    fn snapshot_serializes_with_rendered_bucket_keys() {
        let store = AggregateStore::new();
        store.add(bucket(7), "W1", &reach(&[("a", true)]));
        let json = serde_json::to_value(store.get(None).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({ "1.6.2024 10.7": { "W1": { "a": true } } }));
    }

    #[tokio::test]
    async fn sink_merges_observed_results() {
        let store = AggregateStore::shared();
        let sink = StoreSink::new(store.clone());
        let result = PollResult::new("W9", bucket(0), reach(&[("x", true)]));
        sink.update(&result).await.unwrap();
        assert_eq!(store.get(Some("x")), Some(Lookup::Reachable(true)));
    }
}
