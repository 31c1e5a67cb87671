//! Startup wiring: partition the device pool, attach every worker to the
//! shared store and run all workers side by side.
//!
//! Workers are driven with `join_all` from a single task, so they interleave
//! only at their await points (the interval sleep and the ping batch).

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::bus::Observable;
use crate::device::Device;
use crate::error::{PartitionError, WorkerError};
use crate::lifecycle::Startable;
use crate::partition::{Partition, RemainderPolicy, partition};
use crate::store::{AggregateStore, Lookup, Storable, StoreSink};
use crate::worker::{PollWorker, RunSummary};

/// How each worker's `start` ended, by worker name.
pub type RunReport = Vec<(String, Result<RunSummary, WorkerError>)>;

pub struct Orchestrator {
    workers: Vec<Arc<PollWorker>>,
    pending: Mutex<Vec<Device>>,
    store: Arc<AggregateStore>,
    policy: RemainderPolicy,
}

impl Orchestrator {
    pub fn new(store: Arc<AggregateStore>) -> Self {
        Self {
            workers: Vec::new(),
            pending: Mutex::new(Vec::new()),
            store,
            policy: RemainderPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RemainderPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register a worker and subscribe the store to its results.
    pub fn add_worker(&mut self, worker: PollWorker) -> Arc<PollWorker> {
        worker.attach(Arc::new(StoreSink::new(self.store.clone())));
        let worker = Arc::new(worker);
        self.workers.push(worker.clone());
        worker
    }

    pub fn add_device(&mut self, device: impl Into<Device>) {
        self.pending.get_mut().push(device.into());
    }

    pub fn add_devices(&mut self, devices: impl IntoIterator<Item = Device>) {
        self.pending.get_mut().extend(devices);
    }

    pub fn workers(&self) -> &[Arc<PollWorker>] {
        &self.workers
    }

    pub fn worker(&self, name: &str) -> Option<&Arc<PollWorker>> {
        self.workers.iter().find(|w| w.name() == name)
    }

    pub fn store(&self) -> &Arc<AggregateStore> {
        &self.store
    }

    /// Devices not yet handed to any worker.
    pub fn pending_devices(&self) -> usize {
        self.pending.lock().len()
    }

    /// `None` for the whole store, otherwise a recursive lookup.
    pub fn get_data(&self, key: Option<&str>) -> Option<Lookup> {
        self.store.get(key)
    }

    /// Split the pending devices across the workers and hand them over.
    ///
    /// Devices are assigned once; a second call only distributes devices added
    /// since the first.
    pub fn assign_devices(&self) -> Result<Partition, PartitionError> {
        let devices = std::mem::take(&mut *self.pending.lock());
        let total = devices.len();
        let partition = partition(devices, self.workers.len(), self.policy)?;

        for (worker, share) in partition.zip(&self.workers) {
            worker.assign(share.iter().cloned());
        }

        info!(
            devices = total,
            workers = self.workers.len(),
            assigned = partition.assigned_count(),
            "devices partitioned"
        );
        if partition.dropped_count() > 0 {
            warn!(
                dropped = partition.dropped_count(),
                policy = ?self.policy,
                "devices left unassigned by the partition"
            );
        }
        Ok(partition)
    }

    /// Partition the pool, then run every worker until all of them stop.
    pub async fn run(&self) -> Result<RunReport, PartitionError> {
        self.assign_devices()?;
        info!(workers = self.workers.len(), "starting workers");

        let report = join_all(self.workers.iter().map(|worker| async move {
            (worker.name().to_string(), worker.start().await)
        }))
        .await;

        Ok(report)
    }

    pub fn stop_all(&self) {
        for worker in &self.workers {
            worker.stop();
        }
    }
}
