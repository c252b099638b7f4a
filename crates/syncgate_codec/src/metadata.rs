//! Per-document sync metadata record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cas::decode_cas;
use crate::error::CodecResult;

/// Channel name mapped to the sequence at which the grant became
/// effective.
pub type TimedSet = BTreeMap<String, u64>;

/// Principal (user or role) name mapped to the channels granted to it.
pub type AccessMap = BTreeMap<String, TimedSet>;

/// Channel assignment map. `None` means the document is currently in the
/// channel; `Some(grant)` records its removal.
pub type ChannelMap = BTreeMap<String, Option<ChannelGrant>>;

/// Removal record for a channel assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGrant {
    /// Sequence at which the assignment changed.
    #[serde(default)]
    pub seq: u64,

    /// Revision that removed the document from the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    /// True if the removal was a deletion.
    #[serde(default, skip_serializing_if = "is_false")]
    pub del: bool,
}

/// Per-document control record maintained by the sync layer.
///
/// Stored as JSON either in the document's `_sync` extended attribute or
/// nested in the body under the same key, depending on the configured
/// metadata location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// CAS value at the time the metadata was written, as hex text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cas: String,

    /// Sequence assigned to the document's latest mutation.
    #[serde(default)]
    pub sequence: u64,

    /// Current revision id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rev: String,

    /// Document flags bitfield.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub flags: u8,

    /// Channels the document is or was assigned to.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channels: ChannelMap,

    /// Channels granted to users by policy evaluation of this document.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub access: AccessMap,

    /// Roles granted to users by policy evaluation of this document.
    #[serde(default, rename = "role_access", skip_serializing_if = "BTreeMap::is_empty")]
    pub role_access: AccessMap,

    /// Unix timestamp at which the document was tombstoned.
    #[serde(default, rename = "tombstoned_at", skip_serializing_if = "Option::is_none")]
    pub tombstoned_at: Option<i64>,
}

impl SyncMetadata {
    /// Decodes the CAS text into its comparable ordering value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CodecError::InvalidCasFormat`] if the stored CAS
    /// text does not match the `0x` + 16 hex digit form.
    pub fn cas_sequence(&self) -> CodecResult<u64> {
        decode_cas(&self.cas)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u8) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_sequence_from_record() {
        let meta = SyncMetadata {
            cas: "0x00002ade734fb714".to_string(),
            ..SyncMetadata::default()
        };
        assert_eq!(meta.cas_sequence().unwrap(), 1492749160563736576);
    }

    #[test]
    fn deserialize_full_record() {
        let raw = br#"{
            "cas": "0x0000000000000000",
            "sequence": 42,
            "rev": "3-abc",
            "flags": 1,
            "channels": {"news": null, "old": {"seq": 40, "rev": "2-def", "del": true}},
            "access": {"alice": {"news": 10}},
            "role_access": {"alice": {"editor": 12}},
            "tombstoned_at": 1700000000
        }"#;
        let meta: SyncMetadata = serde_json::from_slice(raw).unwrap();

        assert_eq!(meta.sequence, 42);
        assert_eq!(meta.rev, "3-abc");
        assert_eq!(meta.flags, 1);
        assert_eq!(meta.channels["news"], None);
        let removal = meta.channels["old"].as_ref().unwrap();
        assert_eq!(removal.seq, 40);
        assert_eq!(removal.rev.as_deref(), Some("2-def"));
        assert!(removal.del);
        assert_eq!(meta.access["alice"]["news"], 10);
        assert_eq!(meta.role_access["alice"]["editor"], 12);
        assert_eq!(meta.tombstoned_at, Some(1700000000));
    }

    #[test]
    fn deserialize_sparse_record() {
        let meta: SyncMetadata = serde_json::from_str(r#"{"sequence": 1}"#).unwrap();
        assert_eq!(meta.sequence, 1);
        assert!(meta.cas.is_empty());
        assert!(meta.channels.is_empty());
        assert_eq!(meta.tombstoned_at, None);
    }
}
