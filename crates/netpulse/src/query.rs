//! Most-specific-segment lookups over a [`Storable`].
//!
//! A query is an ordered list of optional path segments, least specific
//! first. The last non-empty segment is used as a single flat key for the
//! store's recursive search; the other segments do not narrow the search.
//! With no segments at all the whole store is returned.

use std::sync::Arc;

use tracing::trace;

use crate::error::QueryError;
use crate::store::{Lookup, Storable};

/// Segments beyond this are rejected.
pub const MAX_SEGMENTS: usize = 5;

#[derive(Clone)]
pub struct QueryResolver {
    store: Arc<dyn Storable>,
}

impl QueryResolver {
    pub fn new(store: Arc<dyn Storable>) -> Self {
        Self { store }
    }

    /// Pick the key a list of segments resolves to, if any.
    pub fn select_key<S: AsRef<str>>(segments: &[Option<S>]) -> Result<Option<&str>, QueryError> {
        if segments.len() > MAX_SEGMENTS {
            return Err(QueryError::TooManySegments { max: MAX_SEGMENTS, got: segments.len() });
        }
        for segment in segments.iter().rev().flatten() {
            let segment: &str = segment.as_ref();
            if !segment.is_empty() {
                return Ok(Some(segment));
            }
        }
        Ok(None)
    }

    pub fn resolve<S: AsRef<str>>(&self, segments: &[Option<S>]) -> Result<Lookup, QueryError> {
        let key = Self::select_key(segments)?;
        trace!(?key, "resolving query");
        self.store
            .get(key)
            .ok_or_else(|| QueryError::NotFound(key.unwrap_or_default().to_string()))
    }

    /// Resolve a `/`-separated path such as `"5.3.2024 9.7/W1/10.0.0.1"`.
    ///
    /// Trailing slashes do not count as segments.
    pub fn resolve_path(&self, path: &str) -> Result<Lookup, QueryError> {
        let segments: Vec<Option<&str>> = path
            .trim_end_matches('/')
            .split('/')
            .map(|segment| Some(segment).filter(|s| !s.is_empty()))
            .collect();
        self.resolve(&segments)
    }
}
