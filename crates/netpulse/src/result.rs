use std::collections::BTreeMap;

use serde::Serialize;

use crate::bucket::BucketKey;
use crate::ping::PingReply;

/// Address -> reachable.
pub type Reachability = BTreeMap<String, bool>;

/// One poll cycle's output. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollResult {
    worker: String,
    bucket: BucketKey,
    reachability: Reachability,
}

impl PollResult {
    pub fn new(worker: impl Into<String>, bucket: BucketKey, reachability: Reachability) -> Self {
        Self { worker: worker.into(), bucket, reachability }
    }

    pub fn from_replies(
        worker: impl Into<String>,
        bucket: BucketKey,
        replies: impl IntoIterator<Item = PingReply>,
    ) -> Self {
        let reachability = replies
            .into_iter()
            .map(|reply| (reply.address.into_inner(), reply.is_alive))
            .collect();
        Self::new(worker, bucket, reachability)
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    pub fn bucket(&self) -> BucketKey {
        self.bucket
    }

    pub fn reachability(&self) -> &Reachability {
        &self.reachability
    }

    pub fn alive_count(&self) -> usize {
        self.reachability.values().filter(|alive| **alive).count()
    }
}
