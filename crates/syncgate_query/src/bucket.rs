//! Collaborator contract for the document bucket's query engines.

use serde_json::{Map, Value};

use crate::error::{QueryError, QueryResult};
use crate::iterator::ResultIterator;
use crate::view::ViewQueryOptions;

/// Consistency bound for a declarative query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyMode {
    /// Wait for the index to catch up to the requesting write. Used for
    /// correctness-sensitive reads such as channel and access grants.
    RequestPlus,
    /// Best effort, no consistency bound. Used for maintenance scans.
    NotBounded,
}

/// Named bind parameters for a declarative statement.
pub type QueryParams = Map<String, Value>;

/// Boxed single-pass result handle returned by every query path.
pub type BoxedResultIterator = Box<dyn ResultIterator>;

/// Handle to the document bucket's query engines.
///
/// Every bucket serves materialized view queries. Declarative
/// secondary-index queries are optional; buckets without that engine
/// keep the default implementation, which fails with
/// [`QueryError::UnsupportedBackend`] before any call is attempted.
///
/// Retries, pooling, and pagination are the implementor's (or its
/// caller's) concern; this layer performs a single round trip per call.
pub trait Bucket: Send + Sync {
    /// Keyspace name substituted for the keyspace token in statements.
    fn keyspace(&self) -> &str;

    /// Runs a view query against `design_doc`/`view`.
    ///
    /// # Errors
    ///
    /// Returns an error if the view engine rejects or fails the query.
    fn view_query(
        &self,
        design_doc: &str,
        view: &str,
        options: &ViewQueryOptions,
    ) -> QueryResult<BoxedResultIterator>;

    /// Runs a declarative statement with named bind parameters.
    ///
    /// `prepared` marks statements that are safe to prepare and reuse
    /// across calls.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnsupportedBackend`] if the bucket has no
    /// declarative query engine, or the engine's error otherwise.
    fn query(
        &self,
        statement: &str,
        params: Option<&QueryParams>,
        consistency: ConsistencyMode,
        prepared: bool,
    ) -> QueryResult<BoxedResultIterator> {
        let _ = (statement, params, consistency, prepared);
        Err(QueryError::unsupported_backend(
            "bucket has no declarative query engine",
        ))
    }
}
