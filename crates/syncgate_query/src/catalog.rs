//! Process-wide catalog of logical query definitions.
//!
//! Each logical query has two forms: a materialized view (design
//! document + view name) and a declarative statement template. The
//! templates carry a keyspace token and a metadata-location token that
//! are rewritten at statement-build time, plus named bind parameters.
//!
//! The catalog is a fixed table built into the binary; it is immutable
//! and safe for unsynchronized concurrent reads.

/// Token in statement templates standing for the bucket keyspace.
pub const KEYSPACE_TOKEN: &str = "$_keyspace";

/// Token in statement templates standing for the sync-metadata location.
pub const SYNC_TOKEN: &str = "$sync";

/// Metadata path when extended-attribute storage is active.
const SYNC_XATTR_PATH: &str = "meta(`$_keyspace`).xattrs._sync";

/// Metadata path when metadata is nested inline in the document body.
const SYNC_INLINE_PATH: &str = "`$_keyspace`._sync";

/// LIKE pattern matching every internal housekeeping document id.
pub const SYNC_DOC_WILDCARD: &str = r"\\_sync:%";

/// Wildcard channel that receives every document.
pub const STAR_CHANNEL: &str = "*";

/// Main sync design document (access, role access, channels,
/// principals views).
pub const DESIGN_DOC_SYNC: &str = "sync_gateway";

/// Housekeeping design document (import, sessions, tombstones,
/// all-docs views).
pub const DESIGN_DOC_HOUSEKEEPING: &str = "sync_housekeeping";

/// Bind-parameter name for the channel being queried.
pub const PARAM_CHANNEL_NAME: &str = "channelName";
/// Bind-parameter name for the inclusive range start sequence.
pub const PARAM_START_SEQ: &str = "startSeq";
/// Bind-parameter name for the normalized range end sequence.
pub const PARAM_END_SEQ: &str = "endSeq";
/// Bind-parameter name for the principal being queried.
pub const PARAM_USER_NAME: &str = "userName";
/// Bind-parameter name for the tombstone cutoff timestamp.
pub const PARAM_OLDER_THAN: &str = "olderThan";

/// Logical query identifiers, one per supported access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryId {
    /// Channels granted to a user by policy evaluation.
    AccessGrants,
    /// Roles granted to a user by policy evaluation.
    RoleAccessGrants,
    /// Documents assigned to a channel within a sequence range,
    /// including removal markers.
    ChannelRange,
    /// Sequence-range scan for the wildcard channel; no removal
    /// handling, housekeeping docs excluded.
    StarChannelRange,
    /// Ids of all user and role documents.
    PrincipalIds,
    /// Ids of session documents for a user.
    SessionIds,
    /// Ids of documents tombstoned at or before a cutoff time.
    TombstoneIds,
    /// Documents already carrying sync metadata (index rebuilds).
    ResyncCandidates,
    /// Documents lacking sync metadata (new arrivals to onboard).
    ImportCandidates,
    /// Non-deleted, non-internal documents in an id range.
    AllDocs,
}

/// One logical query: its view form and its declarative template.
#[derive(Debug, Clone)]
pub struct QueryDescriptor {
    /// Logical identifier.
    pub id: QueryId,
    /// Design document holding the view form.
    pub design_doc: &'static str,
    /// View name within the design document.
    pub view: &'static str,
    /// Declarative statement template, carrying the keyspace and sync
    /// tokens and any named bind parameters.
    pub statement: &'static str,
    /// Names of the bind parameters the statement expects.
    pub params: &'static [&'static str],
    /// Whether the statement is safe to prepare and reuse. Statements
    /// that inline caller data or append dynamic clauses are not.
    pub prepared: bool,
}

// The userName parameter lands in the select clause, so the access
// statements are substituted textually and never prepared.
const STMT_ACCESS: &str = r"SELECT $sync.access.`$userName` AS `value` FROM `$_keyspace` WHERE ANY op IN OBJECT_PAIRS($sync.access) SATISFIES op.name = '$userName' END;";

const STMT_ROLE_ACCESS: &str = r"SELECT $sync.role_access.`$userName` AS `value` FROM `$_keyspace` WHERE ANY op IN OBJECT_PAIRS($sync.role_access) SATISFIES op.name = '$userName' END;";

const STMT_CHANNELS: &str = r"SELECT [op.name, LEAST($sync.sequence, op.val.seq), IFMISSING(op.val.rev,null), IFMISSING(op.val.del,null)][1] AS seq, [op.name, LEAST($sync.sequence, op.val.seq), IFMISSING(op.val.rev,null), IFMISSING(op.val.del,null)][2] AS rRev, [op.name, LEAST($sync.sequence, op.val.seq), IFMISSING(op.val.rev,null), IFMISSING(op.val.del,null)][3] AS rDel, $sync.rev AS rev, $sync.flags AS flags, META(`$_keyspace`).id AS id FROM `$_keyspace` UNNEST OBJECT_PAIRS($sync.channels) AS op WHERE [op.name, LEAST($sync.sequence, op.val.seq), IFMISSING(op.val.rev,null), IFMISSING(op.val.del,null)] BETWEEN [$channelName, $startSeq] AND [$channelName, $endSeq]";

// The per-channel index has no entries for the wildcard channel, so the
// star scan walks sequences directly and drops housekeeping docs. Its
// result schema is a subset of the channels schema (no removal columns).
const STMT_STAR_CHANNEL: &str = r"SELECT $sync.sequence AS seq, $sync.rev AS rev, $sync.flags AS flags, META(`$_keyspace`).id AS id FROM `$_keyspace` WHERE $sync.sequence >= $startSeq AND $sync.sequence < $endSeq AND META(`$_keyspace`).id NOT LIKE '\\_sync:%'";

const STMT_PRINCIPALS: &str = r"SELECT META(`$_keyspace`).id FROM `$_keyspace` WHERE META(`$_keyspace`).id LIKE '\\_sync:%' AND (META(`$_keyspace`).id LIKE '\\_sync:user:%' OR META(`$_keyspace`).id LIKE '\\_sync:role:%')";

const STMT_SESSIONS: &str = r"SELECT META(`$_keyspace`).id FROM `$_keyspace` WHERE META(`$_keyspace`).id LIKE '\\_sync:%' AND META(`$_keyspace`).id LIKE '\\_sync:session:%' AND username = $userName";

const STMT_TOMBSTONES: &str = r"SELECT META(`$_keyspace`).id FROM `$_keyspace` WHERE $sync.tombstoned_at BETWEEN 0 AND $olderThan";

const STMT_RESYNC: &str = r"SELECT META(`$_keyspace`).id FROM `$_keyspace` WHERE META(`$_keyspace`).id NOT LIKE '\\_sync:%' AND $sync IS NOT MISSING";

const STMT_IMPORT: &str = r"SELECT META(`$_keyspace`).id FROM `$_keyspace` WHERE META(`$_keyspace`).id NOT LIKE '\\_sync:%' AND $sync.sequence IS MISSING";

// AllDocs appends dynamic id-range filters at dispatch time, so it is
// not prepared-safe.
const STMT_ALL_DOCS: &str = r"SELECT META(`$_keyspace`).id AS id, $sync.rev AS r, $sync.sequence AS s, $sync.channels AS c FROM `$_keyspace` WHERE META(`$_keyspace`).id NOT LIKE '\\_sync:%' AND $sync IS NOT MISSING AND ($sync.flags IS MISSING OR BITTEST($sync.flags,1) = false)";

/// Immutable table of logical query definitions, one descriptor per
/// [`QueryId`], in variant order.
#[derive(Debug)]
pub struct QueryCatalog {
    descriptors: [QueryDescriptor; 10],
}

impl QueryCatalog {
    /// Descriptor for a logical query.
    pub fn get(&self, id: QueryId) -> &QueryDescriptor {
        &self.descriptors[id as usize]
    }

    /// All descriptors, in [`QueryId`] order.
    pub fn descriptors(&self) -> &[QueryDescriptor] {
        &self.descriptors
    }
}

static CATALOG: QueryCatalog = QueryCatalog {
    descriptors: [
        QueryDescriptor {
            id: QueryId::AccessGrants,
            design_doc: DESIGN_DOC_SYNC,
            view: "access",
            statement: STMT_ACCESS,
            params: &[PARAM_USER_NAME],
            prepared: false,
        },
        QueryDescriptor {
            id: QueryId::RoleAccessGrants,
            design_doc: DESIGN_DOC_SYNC,
            view: "role_access",
            statement: STMT_ROLE_ACCESS,
            params: &[PARAM_USER_NAME],
            prepared: false,
        },
        QueryDescriptor {
            id: QueryId::ChannelRange,
            design_doc: DESIGN_DOC_SYNC,
            view: "channels",
            statement: STMT_CHANNELS,
            params: &[PARAM_CHANNEL_NAME, PARAM_START_SEQ, PARAM_END_SEQ],
            prepared: true,
        },
        QueryDescriptor {
            id: QueryId::StarChannelRange,
            design_doc: DESIGN_DOC_SYNC,
            view: "channels",
            statement: STMT_STAR_CHANNEL,
            params: &[PARAM_START_SEQ, PARAM_END_SEQ],
            prepared: true,
        },
        QueryDescriptor {
            id: QueryId::PrincipalIds,
            design_doc: DESIGN_DOC_SYNC,
            view: "principals",
            statement: STMT_PRINCIPALS,
            params: &[],
            prepared: true,
        },
        QueryDescriptor {
            id: QueryId::SessionIds,
            design_doc: DESIGN_DOC_HOUSEKEEPING,
            view: "sessions",
            statement: STMT_SESSIONS,
            params: &[PARAM_USER_NAME],
            prepared: true,
        },
        QueryDescriptor {
            id: QueryId::TombstoneIds,
            design_doc: DESIGN_DOC_HOUSEKEEPING,
            view: "tombstones",
            statement: STMT_TOMBSTONES,
            params: &[PARAM_OLDER_THAN],
            prepared: true,
        },
        QueryDescriptor {
            id: QueryId::ResyncCandidates,
            design_doc: DESIGN_DOC_HOUSEKEEPING,
            view: "import",
            statement: STMT_RESYNC,
            params: &[],
            prepared: true,
        },
        QueryDescriptor {
            id: QueryId::ImportCandidates,
            design_doc: DESIGN_DOC_HOUSEKEEPING,
            view: "import",
            statement: STMT_IMPORT,
            params: &[],
            prepared: true,
        },
        QueryDescriptor {
            id: QueryId::AllDocs,
            design_doc: DESIGN_DOC_HOUSEKEEPING,
            view: "all_docs",
            statement: STMT_ALL_DOCS,
            params: &[],
            prepared: false,
        },
    ],
};

/// Returns the process-wide query catalog.
pub fn catalog() -> &'static QueryCatalog {
    &CATALOG
}

/// Logical query id serving a channel-range request.
///
/// The wildcard channel has no per-channel index entries; it is served
/// by the star-channel template. The substitution is purely name-driven
/// and transparent to the caller.
pub fn channel_query_id(channel_name: &str) -> QueryId {
    if channel_name == STAR_CHANNEL {
        QueryId::StarChannelRange
    } else {
        QueryId::ChannelRange
    }
}

/// Rewrites a statement template for the target bucket and metadata
/// location: the sync token becomes the xattr-namespace path or the
/// inline body path, and the keyspace token becomes `keyspace`.
pub fn render_statement(template: &str, keyspace: &str, use_xattrs: bool) -> String {
    let sync_path = if use_xattrs {
        SYNC_XATTR_PATH
    } else {
        SYNC_INLINE_PATH
    };
    // The sync paths carry the keyspace token themselves, so it is
    // replaced second.
    template
        .replace(SYNC_TOKEN, sync_path)
        .replace(KEYSPACE_TOKEN, keyspace)
}

/// Maps the caller-facing end-sequence convention to the inclusive bound
/// both backends expect: zero means unbounded, any other value is
/// exclusive and is incremented by one.
pub fn normalize_end_seq(end_seq: u64) -> u64 {
    if end_seq == 0 {
        u64::MAX
    } else {
        end_seq.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_align_with_their_ids() {
        for descriptor in catalog().descriptors() {
            assert!(std::ptr::eq(catalog().get(descriptor.id), descriptor));
        }
    }

    #[test]
    fn statements_reference_their_declared_params() {
        for descriptor in catalog().descriptors() {
            for param in descriptor.params {
                assert!(
                    descriptor.statement.contains(&format!("${param}")),
                    "{:?} statement is missing ${param}",
                    descriptor.id
                );
            }
        }
    }

    #[test]
    fn housekeeping_docs_are_excluded_by_the_shared_wildcard() {
        for id in [
            QueryId::StarChannelRange,
            QueryId::PrincipalIds,
            QueryId::ResyncCandidates,
            QueryId::ImportCandidates,
            QueryId::AllDocs,
        ] {
            let statement = catalog().get(id).statement;
            assert!(
                statement.contains(SYNC_DOC_WILDCARD),
                "{id:?} statement does not reference the housekeeping wildcard"
            );
        }
    }

    #[test]
    fn star_channel_is_name_driven() {
        assert_eq!(channel_query_id("*"), QueryId::StarChannelRange);
        assert_eq!(channel_query_id("news"), QueryId::ChannelRange);
        assert_eq!(channel_query_id(""), QueryId::ChannelRange);
    }

    #[test]
    fn render_resolves_all_tokens() {
        for descriptor in catalog().descriptors() {
            for use_xattrs in [true, false] {
                let statement = render_statement(descriptor.statement, "db", use_xattrs);
                assert!(!statement.contains(KEYSPACE_TOKEN));
                assert!(!statement.contains(SYNC_TOKEN), "{statement}");
                assert!(statement.contains("`db`"));
            }
        }
    }

    #[test]
    fn render_selects_metadata_location() {
        let xattr = render_statement(STMT_TOMBSTONES, "db", true);
        assert!(xattr.contains("meta(`db`).xattrs._sync.tombstoned_at"));

        let inline = render_statement(STMT_TOMBSTONES, "db", false);
        assert!(inline.contains("`db`._sync.tombstoned_at"));
    }

    #[test]
    fn end_seq_normalization() {
        assert_eq!(normalize_end_seq(0), u64::MAX);
        assert_eq!(normalize_end_seq(1), 2);
        assert_eq!(normalize_end_seq(1000), 1001);
        assert_eq!(normalize_end_seq(u64::MAX), u64::MAX);
    }
}
