//! Splitting a device pool across poll workers.
//!
//! With `S` devices and `T` workers:
//! - `S < T`: the first `S` workers get one device each, the rest get none.
//! - `S % T == 0`: every worker gets `S / T` devices.
//! - otherwise every worker gets `S / T` devices and the `S % T` leftovers are
//!   handled by the [`RemainderPolicy`].
//!
//! Devices are consumed from the front of the pool, so a device is handed to
//! exactly one worker and no device is skipped.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::PartitionError;

/// What to do with the `S % T` devices left over by an even split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemainderPolicy {
    /// Leave the leftovers unassigned and report them.
    #[default]
    Drop,
    /// Give one leftover each to the first workers, in worker order.
    RoundRobin,
}

/// The outcome of a partition: one share per worker, in worker order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    shares: Vec<Vec<Device>>,
    dropped: Vec<Device>,
}

impl Partition {
    /// Devices assigned to the worker at `index`.
    pub fn share(&self, index: usize) -> &[Device] {
        self.shares.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn shares(&self) -> &[Vec<Device>] {
        &self.shares
    }

    pub fn into_shares(self) -> Vec<Vec<Device>> {
        self.shares
    }

    /// Devices no worker received.
    pub fn dropped(&self) -> &[Device] {
        &self.dropped
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    pub fn assigned_count(&self) -> usize {
        self.shares.iter().map(Vec::len).sum()
    }

    /// Pair each share with the matching worker.
    pub fn zip<'w, W>(&self, workers: &'w [W]) -> impl Iterator<Item = (&'w W, &[Device])> {
        workers.iter().zip(self.shares.iter().map(Vec::as_slice))
    }
}

/// Number of devices every worker receives before the remainder is handled.
pub fn quantity_for_each(devices: usize, workers: usize) -> usize {
    if devices < workers { 1 } else { devices / workers }
}

/// Split `devices` across `workers` workers.
pub fn partition(
    devices: impl IntoIterator<Item = Device>,
    workers: usize,
    policy: RemainderPolicy,
) -> Result<Partition, PartitionError> {
    if workers == 0 {
        return Err(PartitionError::NoWorkers);
    }

    let mut pool: VecDeque<Device> = devices.into_iter().collect();
    let per_worker = quantity_for_each(pool.len(), workers);

    let mut shares: Vec<Vec<Device>> = (0..workers)
        .map(|_| {
            let take = per_worker.min(pool.len());
            pool.drain(..take).collect()
        })
        .collect();

    if policy == RemainderPolicy::RoundRobin {
        for share in shares.iter_mut() {
            match pool.pop_front() {
                Some(device) => share.push(device),
                None => break,
            }
        }
    }

    Ok(Partition { shares, dropped: pool.into() })
}
