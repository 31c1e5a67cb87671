use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::device::Device;

/// Reachability of one address in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingReply {
    pub address: Device,
    pub is_alive: bool,
}

impl PingReply {
    pub fn alive(address: impl Into<Device>) -> Self {
        Self { address: address.into(), is_alive: true }
    }

    pub fn dead(address: impl Into<Device>) -> Self {
        Self { address: address.into(), is_alive: false }
    }
}

/// The probing collaborator.
///
/// Implementations report per-address failures as `is_alive == false`; an
/// `Err` means the whole batch could not be attempted.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping_batch(&self, addresses: &[Device]) -> Result<Vec<PingReply>>;
}
