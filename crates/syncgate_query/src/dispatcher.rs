//! Backend-agnostic dispatch of the logical queries.
//!
//! The dispatcher exposes one operation per logical query. The choice
//! between the view engine and the declarative-index engine is made once
//! at construction, behind the internal [`QueryBackend`] seam, so the
//! dispatch sites never branch on the active backend.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use tracing::{debug, warn};

use crate::bucket::{BoxedResultIterator, Bucket, ConsistencyMode, QueryParams};
use crate::catalog::{
    catalog, channel_query_id, normalize_end_seq, render_statement, QueryId, PARAM_CHANNEL_NAME,
    PARAM_END_SEQ, PARAM_OLDER_THAN, PARAM_START_SEQ, PARAM_USER_NAME,
};
use crate::error::QueryResult;
use crate::iterator::EmptyResultIterator;
use crate::view::{Stale, ViewQueryOptions};

/// Where sync metadata lives on stored documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataLocation {
    /// Out-of-band extended attribute.
    Xattr,
    /// Nested field inside the document body.
    Inline,
}

/// Which engine serves the logical queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Materialized map/reduce views.
    Views,
    /// Declarative secondary-index queries.
    Indexes,
}

/// Dispatches logical queries to the engine selected at construction.
///
/// Every operation is stateless across calls: it performs one
/// synchronous round trip to set up the query and returns a streaming
/// iterator. The iterator is single-consumer and must be closed by its
/// owner on every return path.
pub struct QueryDispatcher {
    backend: Box<dyn QueryBackend>,
}

impl QueryDispatcher {
    /// Selects the execution backend once from the configured mode and
    /// metadata location.
    pub fn new(bucket: Arc<dyn Bucket>, mode: BackendMode, metadata: MetadataLocation) -> Self {
        debug!(?mode, ?metadata, "selecting query backend");
        let backend: Box<dyn QueryBackend> = match mode {
            BackendMode::Views => Box::new(ViewBackend { bucket }),
            BackendMode::Indexes => Box::new(IndexBackend {
                bucket,
                use_xattrs: metadata == MetadataLocation::Xattr,
            }),
        };
        Self { backend }
    }

    /// Channels granted to `username` by policy evaluation.
    ///
    /// A blank username is a documented no-op: the empty iterator is
    /// returned without contacting any backend.
    ///
    /// # Errors
    ///
    /// Passes through backend failures unmodified.
    pub fn access_grants(&self, username: &str) -> QueryResult<BoxedResultIterator> {
        if username.is_empty() {
            warn!("access grants queried with empty username, returning empty result");
            return Ok(Box::new(EmptyResultIterator));
        }
        self.backend.access_grants(username)
    }

    /// Roles granted to `username` by policy evaluation.
    ///
    /// A blank username is a documented no-op, as for
    /// [`access_grants`](Self::access_grants).
    ///
    /// # Errors
    ///
    /// Passes through backend failures unmodified.
    pub fn role_access_grants(&self, username: &str) -> QueryResult<BoxedResultIterator> {
        if username.is_empty() {
            warn!("role access grants queried with empty username, returning empty result");
            return Ok(Box::new(EmptyResultIterator));
        }
        self.backend.role_access_grants(username)
    }

    /// Documents assigned to `channel_name` within `[start_seq, end_seq]`,
    /// including removal markers.
    ///
    /// `end_seq == 0` means unbounded. The wildcard channel `*` is served
    /// by the star-channel template; the substitution is transparent to
    /// the caller. A `limit` of zero means no limit.
    ///
    /// # Errors
    ///
    /// Passes through backend failures unmodified.
    pub fn channel_range(
        &self,
        channel_name: &str,
        start_seq: u64,
        end_seq: u64,
        limit: u64,
    ) -> QueryResult<BoxedResultIterator> {
        self.backend
            .channel_range(channel_name, start_seq, end_seq, limit)
    }

    /// Ids of all user and role documents.
    ///
    /// # Errors
    ///
    /// Passes through backend failures unmodified.
    pub fn principal_ids(&self) -> QueryResult<BoxedResultIterator> {
        self.backend.principal_ids()
    }

    /// Ids of session documents belonging to `username`.
    ///
    /// # Errors
    ///
    /// Passes through backend failures unmodified.
    pub fn session_ids(&self, username: &str) -> QueryResult<BoxedResultIterator> {
        self.backend.session_ids(username)
    }

    /// Ids of documents tombstoned at or before `older_than`.
    ///
    /// Runs without a consistency bound; tombstone cleanup tolerates a
    /// lagging index.
    ///
    /// # Errors
    ///
    /// Passes through backend failures unmodified.
    pub fn tombstone_ids(&self, older_than: SystemTime) -> QueryResult<BoxedResultIterator> {
        let cutoff = older_than
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.backend.tombstone_ids(cutoff)
    }

    /// Documents that already carry sync metadata, for index rebuilds.
    ///
    /// # Errors
    ///
    /// Passes through backend failures unmodified.
    pub fn resync_candidates(&self) -> QueryResult<BoxedResultIterator> {
        self.backend.resync_candidates()
    }

    /// Documents lacking sync metadata, awaiting onboarding.
    ///
    /// # Errors
    ///
    /// Passes through backend failures unmodified.
    pub fn import_candidates(&self) -> QueryResult<BoxedResultIterator> {
        self.backend.import_candidates()
    }

    /// Non-deleted, non-internal documents in the id range
    /// `[start_key, end_key]`. `None` leaves the corresponding bound
    /// open.
    ///
    /// # Errors
    ///
    /// Passes through backend failures unmodified.
    pub fn all_docs(
        &self,
        start_key: Option<&str>,
        end_key: Option<&str>,
    ) -> QueryResult<BoxedResultIterator> {
        self.backend.all_docs(start_key, end_key)
    }
}

/// One execution strategy per engine, selected once at configuration
/// time.
trait QueryBackend: Send + Sync {
    fn access_grants(&self, username: &str) -> QueryResult<BoxedResultIterator>;
    fn role_access_grants(&self, username: &str) -> QueryResult<BoxedResultIterator>;
    fn channel_range(
        &self,
        channel_name: &str,
        start_seq: u64,
        end_seq: u64,
        limit: u64,
    ) -> QueryResult<BoxedResultIterator>;
    fn principal_ids(&self) -> QueryResult<BoxedResultIterator>;
    fn session_ids(&self, username: &str) -> QueryResult<BoxedResultIterator>;
    fn tombstone_ids(&self, older_than_epoch: i64) -> QueryResult<BoxedResultIterator>;
    fn resync_candidates(&self) -> QueryResult<BoxedResultIterator>;
    fn import_candidates(&self) -> QueryResult<BoxedResultIterator>;
    fn all_docs(
        &self,
        start_key: Option<&str>,
        end_key: Option<&str>,
    ) -> QueryResult<BoxedResultIterator>;
}

/// Execution against the materialized view engine.
struct ViewBackend {
    bucket: Arc<dyn Bucket>,
}

impl ViewBackend {
    fn view(&self, id: QueryId, options: ViewQueryOptions) -> QueryResult<BoxedResultIterator> {
        let descriptor = catalog().get(id);
        debug!(
            design_doc = descriptor.design_doc,
            view = descriptor.view,
            "running view query"
        );
        self.bucket
            .view_query(descriptor.design_doc, descriptor.view, &options)
    }
}

/// Composite-key options for the channels view. An empty object sorts
/// after every sequence, standing in for an unbounded end.
fn channel_view_options(
    channel_name: &str,
    start_seq: u64,
    end_seq: u64,
    limit: u64,
) -> ViewQueryOptions {
    let end_key = if end_seq == 0 {
        json!([channel_name, {}])
    } else {
        json!([channel_name, end_seq])
    };
    let mut options = ViewQueryOptions::default()
        .stale(Stale::False)
        .start_key(json!([channel_name, start_seq]))
        .end_key(end_key);
    if limit > 0 {
        options = options.limit(limit);
    }
    options
}

impl QueryBackend for ViewBackend {
    fn access_grants(&self, username: &str) -> QueryResult<BoxedResultIterator> {
        self.view(
            QueryId::AccessGrants,
            ViewQueryOptions::default()
                .stale(Stale::False)
                .key(json!(username)),
        )
    }

    fn role_access_grants(&self, username: &str) -> QueryResult<BoxedResultIterator> {
        self.view(
            QueryId::RoleAccessGrants,
            ViewQueryOptions::default()
                .stale(Stale::False)
                .key(json!(username)),
        )
    }

    fn channel_range(
        &self,
        channel_name: &str,
        start_seq: u64,
        end_seq: u64,
        limit: u64,
    ) -> QueryResult<BoxedResultIterator> {
        // The channels view indexes the star channel like any other, so
        // no template substitution happens on this path.
        self.view(
            QueryId::ChannelRange,
            channel_view_options(channel_name, start_seq, end_seq, limit),
        )
    }

    fn principal_ids(&self) -> QueryResult<BoxedResultIterator> {
        self.view(
            QueryId::PrincipalIds,
            ViewQueryOptions::default().stale(Stale::False),
        )
    }

    fn session_ids(&self, username: &str) -> QueryResult<BoxedResultIterator> {
        self.view(
            QueryId::SessionIds,
            ViewQueryOptions::default()
                .stale(Stale::False)
                .start_key(json!(username))
                .end_key(json!(username)),
        )
    }

    fn tombstone_ids(&self, older_than_epoch: i64) -> QueryResult<BoxedResultIterator> {
        self.view(
            QueryId::TombstoneIds,
            ViewQueryOptions::default()
                .stale(Stale::Ok)
                .start_key(json!(1))
                .end_key(json!(older_than_epoch)),
        )
    }

    fn resync_candidates(&self) -> QueryResult<BoxedResultIterator> {
        // The import view keys on "has sync metadata"; resync reads the
        // true half of the keyspace, import the false half.
        self.view(
            QueryId::ResyncCandidates,
            ViewQueryOptions::default()
                .stale(Stale::False)
                .reduce(false)
                .start_key(json!([true])),
        )
    }

    fn import_candidates(&self) -> QueryResult<BoxedResultIterator> {
        self.view(
            QueryId::ImportCandidates,
            ViewQueryOptions::default()
                .stale(Stale::False)
                .reduce(false)
                .end_key(json!([true]))
                .inclusive_end(false),
        )
    }

    fn all_docs(
        &self,
        start_key: Option<&str>,
        end_key: Option<&str>,
    ) -> QueryResult<BoxedResultIterator> {
        let mut options = ViewQueryOptions::default().stale(Stale::False).reduce(false);
        if let Some(start) = start_key {
            options = options.start_key(json!(start));
        }
        if let Some(end) = end_key {
            options = options.end_key(json!(end));
        }
        self.view(QueryId::AllDocs, options)
    }
}

/// Execution against the declarative-index engine.
struct IndexBackend {
    bucket: Arc<dyn Bucket>,
    use_xattrs: bool,
}

impl IndexBackend {
    fn statement(&self, id: QueryId) -> (String, &'static crate::catalog::QueryDescriptor) {
        let descriptor = catalog().get(id);
        let statement = render_statement(descriptor.statement, self.bucket.keyspace(), self.use_xattrs);
        debug!(id = ?descriptor.id, "built index statement");
        (statement, descriptor)
    }

    /// Access statements carry the username in the select clause, so it
    /// is substituted textually instead of bound.
    fn principal_query(&self, id: QueryId, username: &str) -> QueryResult<BoxedResultIterator> {
        let (statement, descriptor) = self.statement(id);
        let statement = statement.replace(&format!("${PARAM_USER_NAME}"), username);
        self.bucket.query(
            &statement,
            None,
            ConsistencyMode::RequestPlus,
            descriptor.prepared,
        )
    }
}

impl QueryBackend for IndexBackend {
    fn access_grants(&self, username: &str) -> QueryResult<BoxedResultIterator> {
        self.principal_query(QueryId::AccessGrants, username)
    }

    fn role_access_grants(&self, username: &str) -> QueryResult<BoxedResultIterator> {
        self.principal_query(QueryId::RoleAccessGrants, username)
    }

    fn channel_range(
        &self,
        channel_name: &str,
        start_seq: u64,
        end_seq: u64,
        limit: u64,
    ) -> QueryResult<BoxedResultIterator> {
        let id = channel_query_id(channel_name);
        let (mut statement, descriptor) = self.statement(id);
        if limit > 0 {
            statement = format!("{statement} LIMIT {limit}");
        }

        let mut params = QueryParams::new();
        if id == QueryId::ChannelRange {
            params.insert(PARAM_CHANNEL_NAME.to_string(), json!(channel_name));
        }
        params.insert(PARAM_START_SEQ.to_string(), json!(start_seq));
        params.insert(PARAM_END_SEQ.to_string(), json!(normalize_end_seq(end_seq)));

        self.bucket.query(
            &statement,
            Some(&params),
            ConsistencyMode::RequestPlus,
            descriptor.prepared,
        )
    }

    fn principal_ids(&self) -> QueryResult<BoxedResultIterator> {
        let (statement, descriptor) = self.statement(QueryId::PrincipalIds);
        self.bucket.query(
            &statement,
            None,
            ConsistencyMode::RequestPlus,
            descriptor.prepared,
        )
    }

    fn session_ids(&self, username: &str) -> QueryResult<BoxedResultIterator> {
        let (statement, descriptor) = self.statement(QueryId::SessionIds);
        let mut params = QueryParams::new();
        params.insert(PARAM_USER_NAME.to_string(), json!(username));
        self.bucket.query(
            &statement,
            Some(&params),
            ConsistencyMode::RequestPlus,
            descriptor.prepared,
        )
    }

    fn tombstone_ids(&self, older_than_epoch: i64) -> QueryResult<BoxedResultIterator> {
        let (statement, descriptor) = self.statement(QueryId::TombstoneIds);
        let mut params = QueryParams::new();
        params.insert(PARAM_OLDER_THAN.to_string(), json!(older_than_epoch));
        self.bucket.query(
            &statement,
            Some(&params),
            ConsistencyMode::NotBounded,
            descriptor.prepared,
        )
    }

    fn resync_candidates(&self) -> QueryResult<BoxedResultIterator> {
        let (statement, descriptor) = self.statement(QueryId::ResyncCandidates);
        self.bucket.query(
            &statement,
            None,
            ConsistencyMode::RequestPlus,
            descriptor.prepared,
        )
    }

    fn import_candidates(&self) -> QueryResult<BoxedResultIterator> {
        let (statement, descriptor) = self.statement(QueryId::ImportCandidates);
        self.bucket.query(
            &statement,
            None,
            ConsistencyMode::RequestPlus,
            descriptor.prepared,
        )
    }

    fn all_docs(
        &self,
        start_key: Option<&str>,
        end_key: Option<&str>,
    ) -> QueryResult<BoxedResultIterator> {
        let (mut statement, descriptor) = self.statement(QueryId::AllDocs);
        if let Some(start) = start_key {
            statement = format!("{statement} AND META().id >= '{start}'");
        }
        if let Some(end) = end_key {
            statement = format!("{statement} AND META().id <= '{end}'");
        }
        self.bucket.query(
            &statement,
            None,
            ConsistencyMode::RequestPlus,
            descriptor.prepared,
        )
    }
}
