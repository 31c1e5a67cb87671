//! Subject/observer fan-out for poll results.
//!
//! A [`Subject`] keeps an ordered list of observers and the latest result.
//! `notify` hands that result to every observer in attachment order and
//! waits for each one before moving to the next. A failing or panicking
//! observer is logged and skipped; the rest still receive the result.
//! Nothing is queued: with no observers attached the result is simply dropped.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info, trace, warn};

use crate::error::BusError;
use crate::result::PollResult;

/// Receives poll results from a [`Subject`].
#[async_trait]
pub trait Observer: Send + Sync {
    async fn update(&self, result: &PollResult) -> Result<()>;

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Attach/detach/notify, implemented by anything that broadcasts results.
#[async_trait]
pub trait Observable: Send + Sync {
    fn attach(&self, observer: Arc<dyn Observer>);
    fn detach(&self, observer: &Arc<dyn Observer>) -> Result<(), BusError>;
    async fn notify(&self) -> Delivery;
}

/// How one `notify` went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct Subject {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
    latest: RwLock<Option<Arc<PollResult>>>,
}

impl std::fmt::Debug for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.observer_count())
            .field("latest", &self.latest.read())
            .finish()
    }
}

fn same_observer(a: &Arc<dyn Observer>, b: &Arc<dyn Observer>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl Subject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    pub fn latest(&self) -> Option<Arc<PollResult>> {
        self.latest.read().clone()
    }

    /// Replace the latest result and notify every observer.
    pub async fn publish(&self, result: PollResult) -> Delivery {
        *self.latest.write() = Some(Arc::new(result));
        self.notify().await
    }
}

#[async_trait]
impl Observable for Subject {
    /// Registering the same observer twice means it is notified twice.
    fn attach(&self, observer: Arc<dyn Observer>) {
        self.observers.write().push(observer);
    }

    /// Remove the first registration of `observer`.
    fn detach(&self, observer: &Arc<dyn Observer>) -> Result<(), BusError> {
        let mut observers = self.observers.write();
        let index = observers
            .iter()
            .position(|attached| same_observer(attached, observer))
            .ok_or_else(|| BusError::NotAttached(observer.name().to_string()))?;
        observers.remove(index);
        Ok(())
    }

    async fn notify(&self) -> Delivery {
        let Some(result) = self.latest() else {
            return Delivery::default();
        };
        // Snapshot so observers can attach/detach while we deliver.
        let observers: Vec<Arc<dyn Observer>> = self.observers.read().clone();

        if observers.is_empty() {
            trace!(worker = result.worker(), "no observers attached, result dropped");
            return Delivery::default();
        }

        let mut delivery = Delivery::default();
        for observer in observers {
            match AssertUnwindSafe(observer.update(&result)).catch_unwind().await {
                Ok(Ok(())) => delivery.delivered += 1,
                Ok(Err(e)) => {
                    warn!(observer = observer.name(), worker = result.worker(), "observer update failed: {e:#}");
                    delivery.failed += 1;
                }
                Err(_) => {
                    error!(observer = observer.name(), worker = result.worker(), "observer panicked during update");
                    delivery.failed += 1;
                }
            }
        }
        delivery
    }
}

/// Logs a one-line summary of every result.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

#[async_trait]
impl Observer for LogObserver {
    async fn update(&self, result: &PollResult) -> Result<()> {
        info!(
            worker = result.worker(),
            bucket = %result.bucket(),
            alive = result.alive_count(),
            total = result.reachability().len(),
            "poll cycle finished"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use chrono::NaiveDate;
    use parking_lot::Mutex;

    use super::*;
    use crate::bucket::BucketKey;
    use crate::result::Reachability;

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Observer for Recorder {
        async fn update(&self, _result: &PollResult) -> Result<()> {
            self.log.lock().push(self.label);
            Ok(())
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    struct Failing;

    #[async_trait]
    impl Observer for Failing {
        async fn update(&self, _result: &PollResult) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Observer for Panicking {
        async fn update(&self, _result: &PollResult) -> Result<()> {
            panic!("observer bug");
        }
    }

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl Observer for Counter {
        async fn update(&self, _result: &PollResult) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn result() -> PollResult {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let mut reach = Reachability::new();
        reach.insert("10.1".into(), true);
        PollResult::new("W1", BucketKey::from_datetime(at), reach)
    }

    #[tokio::test]
    async fn delivers_in_attachment_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let subject = Subject::new();
        for label in ["a", "b", "c"] {
            subject.attach(Arc::new(Recorder { label, log: log.clone() }));
        }

        let delivery = subject.publish(result()).await;
        assert_eq!(delivery, Delivery { delivered: 3, failed: 0 });
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn duplicate_attachment_delivers_twice() {
        let counter = Arc::new(Counter::default());
        let subject = Subject::new();
        subject.attach(counter.clone());
        subject.attach(counter.clone());

        subject.publish(result()).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        let as_observer: Arc<dyn Observer> = counter.clone();
        subject.detach(&as_observer).unwrap();
        subject.notify().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let counter = Arc::new(Counter::default());
        let subject = Subject::new();
        subject.attach(Arc::new(Failing));
        subject.attach(Arc::new(Panicking));
        subject.attach(counter.clone());

        let delivery = subject.publish(result()).await;
        assert_eq!(delivery, Delivery { delivered: 1, failed: 2 });
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_observers_drops_the_result() {
        let subject = Subject::new();
        assert_eq!(subject.publish(result()).await, Delivery::default());
        assert!(subject.latest().is_some());
    }

    #[tokio::test]
    async fn notify_without_a_result_is_a_no_op() {
        let counter = Arc::new(Counter::default());
        let subject = Subject::new();
        subject.attach(counter.clone());
        assert_eq!(subject.notify().await, Delivery::default());
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn detaching_a_stranger_fails() {
        let subject = Subject::new();
        subject.attach(Arc::new(LogObserver));
        let stranger: Arc<dyn Observer> = Arc::new(Counter::default());
        assert!(matches!(subject.detach(&stranger), Err(BusError::NotAttached(_))));
        assert_eq!(subject.observer_count(), 1);
    }
}
