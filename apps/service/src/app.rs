//! Builds the running system out of a [`Config`].

use std::sync::Arc;

use netpulse::{
    AggregateStore, FailurePolicy, LogObserver, Orchestrator, Pinger, PollWorker, WorkerError,
};
use tracing::debug;

use crate::config::Config;
use crate::devices::collect_devices;
use crate::ping::SystemPinger;

/// One worker per `monitor.workers`, named `W0`, `W1`, ..., all sharing one
/// system pinger, with the configured device pool queued for partitioning.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator, WorkerError> {
    build_with_pinger(config, Arc::new(SystemPinger::new(&config.ping)))
}

pub fn build_with_pinger(config: &Config, pinger: Arc<dyn Pinger>) -> Result<Orchestrator, WorkerError> {
    let monitor = &config.monitor;
    let failure_policy = FailurePolicy { max_consecutive_failures: monitor.max_consecutive_failures };
    let mut orchestrator = Orchestrator::new(AggregateStore::shared()).with_policy(monitor.remainder);

    for index in 0..monitor.workers {
        let worker = PollWorker::builder(format!("W{index}"))
            .interval_secs(monitor.interval_seconds)
            .pinger(pinger.clone())
            .failure_policy(failure_policy)
            .observer(Arc::new(LogObserver))
            .build()?;
        orchestrator.add_worker(worker);
    }

    let devices = collect_devices(&config.devices);
    debug!(devices = devices.len(), "device pool loaded");
    orchestrator.add_devices(devices);

    Ok(orchestrator)
}
