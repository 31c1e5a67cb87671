//! [`Pinger`] backed by the platform `ping` program.

use std::process::Stdio;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use netpulse::{Device, PingReply, Pinger};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::config::Ping;

/// Runs one `ping -c <count> -W <timeout> <address>` per address, all of a
/// batch at once. Exit status 0 means reachable.
#[derive(Debug, Clone)]
pub struct SystemPinger {
    program: String,
    timeout_seconds: u32,
    count: u32,
}

impl SystemPinger {
    pub fn new(config: &Ping) -> Self {
        Self {
            program: config.program.clone(),
            timeout_seconds: config.timeout_seconds,
            count: config.count,
        }
    }

    async fn probe(&self, address: &Device) -> bool {
        let status = Command::new(&self.program)
            .args([
                "-c",
                &self.count.to_string(),
                "-W",
                &self.timeout_seconds.to_string(),
                address.as_str(),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;

        match status {
            Ok(status) => {
                trace!(%address, code = ?status.code(), "probe finished");
                status.success()
            }
            Err(e) => {
                debug!(%address, program = %self.program, error = %e, "failed to spawn probe");
                false
            }
        }
    }
}

#[async_trait]
impl Pinger for SystemPinger {
    async fn ping_batch(&self, addresses: &[Device]) -> Result<Vec<PingReply>> {
        let replies = join_all(addresses.iter().map(|address| async move {
            PingReply { address: address.clone(), is_alive: self.probe(address).await }
        }))
        .await;
        Ok(replies)
    }
}
