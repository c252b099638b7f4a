//! Typed result rows for the logical queries.
//!
//! Field renames follow the aliases in the statement templates and the
//! view map functions, so rows deserialize directly from either backend.

use serde::Deserialize;
use syncgate_codec::{ChannelMap, TimedSet};

/// Row for queries that only return a document id.
#[derive(Debug, Clone, Deserialize)]
pub struct IdRow {
    /// Document id.
    pub id: String,
}

/// Row returned by the access and role-access queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessRow {
    /// Channels granted to the principal, with their grant sequences.
    #[serde(default)]
    pub value: TimedSet,
}

/// Row returned by the channel-range queries.
///
/// The star-channel schema is a subset of this one: the removal columns
/// stay `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelRow {
    /// Document id.
    #[serde(default)]
    pub id: String,

    /// Current revision id.
    #[serde(default)]
    pub rev: String,

    /// Sequence of the channel assignment (or removal).
    #[serde(default, rename = "seq")]
    pub sequence: u64,

    /// Document flags bitfield.
    #[serde(default)]
    pub flags: u8,

    /// Revision that removed the document from the channel, if any.
    #[serde(default, rename = "rRev")]
    pub removal_rev: Option<String>,

    /// Whether the removal was a deletion.
    #[serde(default, rename = "rDel")]
    pub removal_del: Option<bool>,
}

/// Revision/sequence/channel summary carried by the all-docs view rows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllDocsViewValue {
    /// Current revision id.
    #[serde(default, rename = "r")]
    pub rev: String,

    /// Latest sequence.
    #[serde(default, rename = "s")]
    pub sequence: u64,

    /// Channels the document is currently in.
    #[serde(default, rename = "c")]
    pub channels: Vec<String>,
}

/// View row for the all-docs query.
#[derive(Debug, Clone, Deserialize)]
pub struct AllDocsViewRow {
    /// Document id key.
    pub key: String,

    /// Summary emitted by the view map function.
    #[serde(default)]
    pub value: AllDocsViewValue,
}

/// Declarative-index row for the all-docs query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllDocsIndexRow {
    /// Document id.
    #[serde(default)]
    pub id: String,

    /// Current revision id.
    #[serde(default, rename = "r")]
    pub rev: String,

    /// Latest sequence.
    #[serde(default, rename = "s")]
    pub sequence: u64,

    /// Channel assignment map.
    #[serde(default, rename = "c")]
    pub channels: ChannelMap,
}
