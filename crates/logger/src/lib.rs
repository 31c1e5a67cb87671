//! Shared tracing setup for the netpulse binaries.

mod subscriber;

pub use subscriber::{init_tracing, level_for_verbosity};
