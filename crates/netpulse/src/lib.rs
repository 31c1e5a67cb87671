//! netpulse - partitioned reachability polling
//!
//! A pool of addresses is split across poll workers. Each worker pings its
//! share on a fixed interval and broadcasts the result to its observers; the
//! [`AggregateStore`] merges those results into minute buckets and answers
//! recursive key lookups through the [`QueryResolver`].

pub mod bucket;
pub mod bus;
pub mod device;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod partition;
pub mod ping;
pub mod query;
pub mod result;
pub mod store;
pub mod worker;

pub use bucket::{BucketKey, Clock, SystemClock};
pub use bus::{Delivery, LogObserver, Observable, Observer, Subject};
pub use device::Device;
pub use error::{BusError, PartitionError, QueryError, StoreError, WorkerError};
pub use lifecycle::{ActiveLoop, Lifecycle, LifecycleState, Startable, Status as LifecycleStatus};
pub use orchestrator::Orchestrator;
pub use partition::{Partition, RemainderPolicy, partition};
pub use ping::{PingReply, Pinger};
pub use query::{MAX_SEGMENTS, QueryResolver};
pub use result::{PollResult, Reachability};
pub use store::{AggregateStore, Lookup, Storable, StoreSink};
pub use worker::{CycleOutcome, FailurePolicy, PollWorker, RunSummary, WorkerStats};
