//! Poll workers.
//!
//! A [`PollWorker`] owns a share of the device pool. While its lifecycle is
//! `Running` it repeats one cycle: sleep for the interval, ping its devices,
//! build a [`PollResult`] for the current minute and publish it to its
//! observers. Cycles of one worker never overlap.
//!
//! Each cycle ends in a [`CycleOutcome`]. Failed cycles are counted and
//! logged; the [`FailurePolicy`] decides when enough is enough.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bucket::{BucketKey, Clock, SystemClock};
use crate::bus::{Delivery, Observable, Observer, Subject};
use crate::device::Device;
use crate::error::{BusError, WorkerError};
use crate::lifecycle::{Lifecycle, LifecycleState, Startable};
use crate::ping::Pinger;
use crate::result::PollResult;

/// Default seconds between cycles.
pub const DEFAULT_INTERVAL_SECS: f64 = 10.0;

/// How one cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(Delivery),
    Failed(String),
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::Failed(_))
    }
}

/// When to give up on a worker whose cycles keep failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    /// `None` keeps polling forever.
    pub max_consecutive_failures: Option<u32>,
}

impl FailurePolicy {
    pub fn unlimited() -> Self {
        Self { max_consecutive_failures: None }
    }

    pub fn give_up_after(failures: u32) -> Self {
        Self { max_consecutive_failures: Some(failures) }
    }

    fn exhausted(&self, consecutive: u32) -> bool {
        self.max_consecutive_failures.is_some_and(|max| consecutive >= max)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Counters for one worker, cumulative over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub cycles: u64,
    pub completed: u64,
    pub failed: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

/// What one call to `start` did before it returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    cycles: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    consecutive_failures: AtomicU32,
    last_error: RwLock<Option<String>>,
}

pub struct PollWorker {
    name: String,
    devices: RwLock<Vec<Device>>,
    interval: Duration,
    pinger: Arc<dyn Pinger>,
    clock: Arc<dyn Clock>,
    failure_policy: FailurePolicy,
    subject: Subject,
    lifecycle: Lifecycle,
    counters: Counters,
}

impl std::fmt::Debug for PollWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollWorker")
            .field("name", &self.name)
            .field("devices", &self.devices.read().len())
            .field("interval", &self.interval)
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

/// Builder for [`PollWorker`].
pub struct PollWorkerBuilder {
    name: String,
    devices: Vec<Device>,
    interval_secs: f64,
    pinger: Option<Arc<dyn Pinger>>,
    clock: Arc<dyn Clock>,
    failure_policy: FailurePolicy,
    observers: Vec<Arc<dyn Observer>>,
}

impl PollWorkerBuilder {
    pub fn devices(mut self, devices: impl IntoIterator<Item = Device>) -> Self {
        self.devices.extend(devices);
        self
    }

    pub fn interval_secs(mut self, secs: f64) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn pinger(mut self, pinger: Arc<dyn Pinger>) -> Self {
        self.pinger = Some(pinger);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> Result<PollWorker, WorkerError> {
        let interval = Duration::try_from_secs_f64(self.interval_secs)
            .map_err(|_| WorkerError::InvalidInterval(self.interval_secs))?;
        let pinger = self.pinger.ok_or_else(|| WorkerError::MissingPinger(self.name.clone()))?;

        let subject = Subject::new();
        for observer in self.observers {
            subject.attach(observer);
        }

        Ok(PollWorker {
            name: self.name,
            devices: RwLock::new(self.devices),
            interval,
            pinger,
            clock: self.clock,
            failure_policy: self.failure_policy,
            subject,
            lifecycle: Lifecycle::new(),
            counters: Counters::default(),
        })
    }
}

impl PollWorker {
    pub fn builder(name: impl Into<String>) -> PollWorkerBuilder {
        PollWorkerBuilder {
            name: name.into(),
            devices: Vec::new(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            pinger: None,
            clock: Arc::new(SystemClock),
            failure_policy: FailurePolicy::default(),
            observers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn devices(&self) -> Vec<Device> {
        self.devices.read().clone()
    }

    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    /// Hand devices to this worker. They belong to it from now on.
    pub fn assign(&self, devices: impl IntoIterator<Item = Device>) {
        let mut owned = self.devices.write();
        let before = owned.len();
        owned.extend(devices);
        debug!(worker = %self.name, added = owned.len() - before, total = owned.len(), "devices assigned");
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// The most recent result handed to observers.
    pub fn latest_result(&self) -> Option<Arc<PollResult>> {
        self.subject.latest()
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            cycles: self.counters.cycles.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            consecutive_failures: self.counters.consecutive_failures.load(Ordering::Relaxed),
            last_error: self.counters.last_error.read().clone(),
        }
    }

    /// Ping every assigned device once and publish the result.
    ///
    /// Does not sleep and ignores the lifecycle; `work` wraps it.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let devices = self.devices();

        let replies = if devices.is_empty() {
            Vec::new()
        } else {
            match AssertUnwindSafe(self.pinger.ping_batch(&devices)).catch_unwind().await {
                Ok(Ok(replies)) => replies,
                Ok(Err(e)) => return self.record(CycleOutcome::Failed(format!("{e:#}"))),
                Err(payload) => {
                    let reason = format!("ping batch panicked: {}", panic_message(payload.as_ref()));
                    return self.record(CycleOutcome::Failed(reason));
                }
            }
        };

        let result = PollResult::from_replies(&self.name, BucketKey::now(self.clock.as_ref()), replies);
        let delivery = self.subject.publish(result).await;
        self.record(CycleOutcome::Completed(delivery))
    }

    fn record(&self, outcome: CycleOutcome) -> CycleOutcome {
        self.counters.cycles.fetch_add(1, Ordering::Relaxed);
        match &outcome {
            CycleOutcome::Completed(delivery) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                self.counters.consecutive_failures.store(0, Ordering::Relaxed);
                debug!(
                    worker = %self.name,
                    delivered = delivery.delivered,
                    failed = delivery.failed,
                    "cycle completed"
                );
            }
            CycleOutcome::Failed(reason) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                let consecutive = self.counters.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                *self.counters.last_error.write() = Some(reason.clone());
                warn!(worker = %self.name, consecutive, "cycle failed: {reason}");
            }
        }
        outcome
    }

    /// Drive cycles until the loop opened at `epoch` is retired.
    ///
    /// A stop that arrives during the sleep ends the loop before the next ping
    /// batch; one that arrives mid-batch is honoured after the notification.
    pub async fn work(&self, epoch: u64) -> Result<RunSummary, WorkerError> {
        let mut summary = RunSummary::default();

        while self.lifecycle.is_current(epoch) {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.lifecycle.retired(epoch) => break,
            }

            let outcome = self.run_cycle().await;
            summary.cycles += 1;
            if outcome.is_failure() {
                summary.failed += 1;
                let consecutive = self.counters.consecutive_failures.load(Ordering::Relaxed);
                if self.failure_policy.exhausted(consecutive) {
                    self.lifecycle.stop();
                    return Err(WorkerError::TooManyFailures {
                        name: self.name.clone(),
                        failures: consecutive,
                        last_error: self.counters.last_error.read().clone().unwrap_or_default(),
                    });
                }
            }
        }

        Ok(summary)
    }
}

#[async_trait]
impl Startable for PollWorker {
    type Summary = RunSummary;
    type Error = WorkerError;

    /// Enter `Running` and poll until stopped. Does not return before then.
    ///
    /// If a retired loop is still inside a cycle, polling begins only once
    /// that cycle has been published.
    async fn start(&self) -> Result<RunSummary, WorkerError> {
        let epoch = self
            .lifecycle
            .begin()
            .ok_or_else(|| WorkerError::AlreadyRunning(self.name.clone()))?;
        let _active = self.lifecycle.enter().await;
        info!(worker = %self.name, devices = self.device_count(), interval = ?self.interval, "worker started");

        let result = self.work(epoch).await;
        match &result {
            Ok(summary) => info!(worker = %self.name, cycles = summary.cycles, failed = summary.failed, "worker stopped"),
            Err(e) => warn!(worker = %self.name, "worker gave up: {e}"),
        }
        result
    }

    fn stop(&self) {
        debug!(worker = %self.name, "stop requested");
        self.lifecycle.stop();
    }

    /// Stop the current loop, then start a new one in its place.
    async fn restart(&self) -> Result<RunSummary, WorkerError> {
        info!(worker = %self.name, "worker restarting");
        self.lifecycle.restarting();
        self.start().await
    }
}

#[async_trait]
impl Observable for PollWorker {
    fn attach(&self, observer: Arc<dyn Observer>) {
        self.subject.attach(observer);
    }

    fn detach(&self, observer: &Arc<dyn Observer>) -> Result<(), BusError> {
        self.subject.detach(observer)
    }

    async fn notify(&self) -> Delivery {
        self.subject.notify().await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{Result, anyhow};
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::ping::PingReply;
    use crate::store::{AggregateStore, Lookup, Storable, StoreSink};

    struct AllAlive;

    #[async_trait]
    impl Pinger for AllAlive {
        async fn ping_batch(&self, addresses: &[Device]) -> Result<Vec<PingReply>> {
            Ok(addresses.iter().cloned().map(PingReply::alive).collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl Pinger for Broken {
        async fn ping_batch(&self, _addresses: &[Device]) -> Result<Vec<PingReply>> {
            Err(anyhow!("raw socket unavailable"))
        }
    }

    struct Panicky;

    #[async_trait]
    impl Pinger for Panicky {
        async fn ping_batch(&self, _addresses: &[Device]) -> Result<Vec<PingReply>> {
            panic!("icmp socket poisoned")
        }
    }

    struct Fixed;

    impl Clock for Fixed {
        fn now(&self) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 2, 2).unwrap().and_hms_opt(8, 30, 0).unwrap()
        }
    }

    fn worker(pinger: Arc<dyn Pinger>) -> PollWorkerBuilder {
        PollWorker::builder("W1").pinger(pinger).clock(Arc::new(Fixed)).interval_secs(1.0)
    }

    #[test]
    fn rejects_malformed_intervals() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let err = worker(Arc::new(AllAlive)).interval_secs(bad).build().unwrap_err();
            assert!(matches!(err, WorkerError::InvalidInterval(_)));
        }
    }

    #[test]
    fn requires_a_pinger() {
        let err = PollWorker::builder("W1").build().unwrap_err();
        assert_eq!(err, WorkerError::MissingPinger("W1".into()));
    }

    #[tokio::test]
    async fn cycle_publishes_to_observers() {
        let store = AggregateStore::shared();
        let w = worker(Arc::new(AllAlive))
            .devices([Device::from("10.1"), Device::from("10.2")])
            .observer(Arc::new(StoreSink::new(store.clone())))
            .build()
            .unwrap();

        let outcome = w.run_cycle().await;
        assert_eq!(outcome, CycleOutcome::Completed(Delivery { delivered: 1, failed: 0 }));
        assert_eq!(store.get(Some("10.2")), Some(Lookup::Reachable(true)));
        assert_eq!(w.latest_result().unwrap().worker(), "W1");
    }

    #[tokio::test]
    async fn empty_share_still_notifies() {
        let store = AggregateStore::shared();
        let w = worker(Arc::new(Broken))
            .observer(Arc::new(StoreSink::new(store.clone())))
            .build()
            .unwrap();

        let outcome = w.run_cycle().await;
        assert!(!outcome.is_failure());
        assert_eq!(store.get(Some("W1")), Some(Lookup::Worker(Default::default())));
    }

    #[tokio::test]
    async fn failed_cycles_are_counted() {
        let w = worker(Arc::new(Broken)).devices([Device::from("10.1")]).build().unwrap();
        assert!(w.run_cycle().await.is_failure());
        assert!(w.run_cycle().await.is_failure());

        let stats = w.stats();
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.consecutive_failures, 2);
        assert!(stats.last_error.unwrap().contains("raw socket"));
    }

    #[tokio::test]
    async fn panicking_batch_is_a_failed_cycle() {
        let w = worker(Arc::new(Panicky)).devices([Device::from("10.1")]).build().unwrap();

        match w.run_cycle().await {
            CycleOutcome::Failed(reason) => assert!(reason.contains("icmp socket poisoned"), "{reason}"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(w.run_cycle().await.is_failure());
        assert_eq!(w.stats().consecutive_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_policy_stops_the_loop() {
        let w = worker(Arc::new(Broken))
            .devices([Device::from("10.1")])
            .failure_policy(FailurePolicy::give_up_after(3))
            .build()
            .unwrap();

        let err = w.start().await.unwrap_err();
        assert!(matches!(err, WorkerError::TooManyFailures { failures: 3, .. }));
        assert_eq!(w.state(), LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_refused() {
        let w = Arc::new(worker(Arc::new(AllAlive)).build().unwrap());
        let running = {
            let w = w.clone();
            tokio::spawn(async move { w.start().await })
        };
        tokio::task::yield_now().await;

        assert_eq!(w.start().await, Err(WorkerError::AlreadyRunning("W1".into())));
        w.stop();
        assert!(running.await.unwrap().is_ok());
    }
}
