use thiserror::Error;

/// Errors raised while splitting devices across workers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("cannot partition devices across an empty worker pool")]
    NoWorkers,
}

/// Errors raised by a poll worker's lifecycle.
#[derive(Debug, Error, PartialEq)]
pub enum WorkerError {
    #[error("poll interval must be a finite, non-negative number of seconds (got {0})")]
    InvalidInterval(f64),

    #[error("worker '{0}' has no ping collaborator")]
    MissingPinger(String),

    #[error("worker '{0}' is already running")]
    AlreadyRunning(String),

    #[error("worker '{name}' stopped after {failures} consecutive failed cycles: {last_error}")]
    TooManyFailures { name: String, failures: u32, last_error: String },
}

/// Errors raised by the notification bus.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("observer '{0}' is not attached")]
    NotAttached(String),
}

/// Errors raised by the aggregate store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("bucket '{0}' not found")]
    BucketNotFound(String),
}

/// Errors raised while resolving a query.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("at most {max} path segments are supported (got {got})")]
    TooManySegments { max: usize, got: usize },

    #[error("no entry for key '{0}'")]
    NotFound(String),
}
