//! # SyncGate Query
//!
//! Logical query catalog and dispatch for the document sync layer.
//!
//! This crate presents a single logical query API over two structurally
//! different engines: a materialized map/reduce view engine and a
//! declarative secondary-index query language. The [`QueryDispatcher`]
//! selects one execution backend at construction time, rewrites the
//! metadata-location token in statement templates for the active
//! storage mode, binds parameters, and returns a uniform single-pass
//! [`ResultIterator`] from every path.
//!
//! Retries, pooling, caching, and pagination are the caller's concern;
//! every operation here performs exactly one synchronous round trip to
//! set up the query.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bucket;
mod catalog;
mod dispatcher;
mod error;
mod iterator;
mod rows;
mod view;

pub use bucket::{BoxedResultIterator, Bucket, ConsistencyMode, QueryParams};
pub use catalog::{
    catalog, channel_query_id, normalize_end_seq, render_statement, QueryCatalog, QueryDescriptor,
    QueryId, DESIGN_DOC_HOUSEKEEPING, DESIGN_DOC_SYNC, KEYSPACE_TOKEN, PARAM_CHANNEL_NAME,
    PARAM_END_SEQ, PARAM_OLDER_THAN, PARAM_START_SEQ, PARAM_USER_NAME, STAR_CHANNEL,
    SYNC_DOC_WILDCARD, SYNC_TOKEN,
};
pub use dispatcher::{BackendMode, MetadataLocation, QueryDispatcher};
pub use error::{QueryError, QueryResult};
pub use iterator::{
    BufferedResultIterator, EmptyResultIterator, ResultIterator, ResultIteratorExt,
};
pub use rows::{
    AccessRow, AllDocsIndexRow, AllDocsViewRow, AllDocsViewValue, ChannelRow, IdRow,
};
pub use view::{Stale, ViewQueryOptions};
