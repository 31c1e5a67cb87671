//! Worker lifecycle: `Stopped` -> `Running` -> `Stopped`, with `Restarting`
//! as a transient hop between a stop and the next start.
//!
//! Every start opens a new epoch. A poll loop keeps going only while the
//! state is `Running` *and* its epoch is still current, so a restart retires
//! the previous loop. At most one loop executes at a time: a new loop waits in
//! [`Lifecycle::enter`] until the retired one has finished its last cycle.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Stopped,
    Running,
    Restarting,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Restarting => write!(f, "restarting"),
        }
    }
}

/// Something that can be driven through the lifecycle.
///
/// `start` does not return until the component stops; `restart` inherits that.
#[async_trait]
pub trait Startable: Send + Sync {
    type Summary: Send;
    type Error: Send;

    async fn start(&self) -> Result<Self::Summary, Self::Error>;
    fn stop(&self);
    async fn restart(&self) -> Result<Self::Summary, Self::Error>;
}

/// Current state plus the epoch of the loop allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub state: LifecycleState,
    pub epoch: u64,
    /// A loop is executing, possibly one that was already retired.
    pub active: bool,
}

/// Held by the executing loop; releases the slot on drop.
#[must_use = "the loop slot is released as soon as the guard is dropped"]
pub struct ActiveLoop<'a> {
    lifecycle: &'a Lifecycle,
}

impl Drop for ActiveLoop<'_> {
    fn drop(&mut self) {
        self.lifecycle.status.send_modify(|status| status.active = false);
    }
}

/// Shared lifecycle flag for one worker.
#[derive(Debug)]
pub struct Lifecycle {
    status: watch::Sender<Status>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (status, _) = watch::channel(Status { state: LifecycleState::Stopped, epoch: 0, active: false });
        Self { status }
    }

    pub fn state(&self) -> LifecycleState {
        self.status.borrow().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Enter `Running` and open a new epoch.
    ///
    /// Returns `None` if the lifecycle is already running.
    pub fn begin(&self) -> Option<u64> {
        let mut epoch = None;
        self.status.send_if_modified(|status| {
            if status.state == LifecycleState::Running {
                return false;
            }
            status.epoch += 1;
            status.state = LifecycleState::Running;
            epoch = Some(status.epoch);
            true
        });
        if let Some(epoch) = epoch {
            debug!(epoch, "lifecycle entered running");
        }
        epoch
    }

    /// Request a stop. Idempotent.
    pub fn stop(&self) {
        self.status.send_if_modified(|status| {
            if status.state == LifecycleState::Stopped {
                return false;
            }
            status.state = LifecycleState::Stopped;
            true
        });
    }

    /// Retire the current epoch and park in `Restarting` until the next `begin`.
    pub fn restarting(&self) {
        self.status.send_modify(|status| {
            status.epoch += 1;
            status.state = LifecycleState::Restarting;
        });
    }

    /// Whether some loop is still executing.
    pub fn is_active(&self) -> bool {
        self.status.borrow().active
    }

    /// Wait until no loop is executing, then claim the slot.
    pub async fn enter(&self) -> ActiveLoop<'_> {
        let mut rx = self.status.subscribe();
        loop {
            let claimed = self.status.send_if_modified(|status| {
                if status.active {
                    return false;
                }
                status.active = true;
                true
            });
            if claimed {
                return ActiveLoop { lifecycle: self };
            }
            debug!("waiting for the previous loop to finish its cycle");
            // The sender lives in `self`, so the channel cannot close under us.
            let _ = rx.wait_for(|status| !status.active).await;
        }
    }

    /// Whether a loop opened at `epoch` may run another cycle.
    pub fn is_current(&self, epoch: u64) -> bool {
        let status = *self.status.borrow();
        status.state == LifecycleState::Running && status.epoch == epoch
    }

    /// Resolve once the loop opened at `epoch` is no longer allowed to run.
    pub async fn retired(&self, epoch: u64) {
        let mut rx = self.status.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx
            .wait_for(|status| status.state != LifecycleState::Running || status.epoch != epoch)
            .await;
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }
}
