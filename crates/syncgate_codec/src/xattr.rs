//! Length-prefixed xattr stream decoding for mutation payloads.
//!
//! The change-notification stream delivers each mutation as
//! `[u32 total_xattr_length][xattr pairs...][document body]`, where each
//! pair is `[u32 pair_length][key][0x00][value][0x00]`. `pair_length`
//! counts from the start of its own 4-byte length field to the byte
//! immediately preceding the next pair. All length fields are big-endian.

use bytes::{Buf, BufMut};

use crate::error::{CodecError, CodecResult};

/// Decodes a mutation payload, returning the document body and the value
/// of the xattr stored under `target_key`.
///
/// The full xattr region is always scanned, even after a match, because
/// the body offset is only known once the declared xattr length has been
/// consumed. Absence of `target_key` is not an error: the returned value
/// slice is empty and the body is still produced.
///
/// # Errors
///
/// Returns [`CodecError::MalformedPayload`] if the declared xattr length
/// overruns the buffer, a pair length is zero or escapes the xattr
/// region, or a null terminator is missing before the pair boundary.
pub fn decode_xattr_stream<'a>(
    target_key: &str,
    payload: &'a [u8],
) -> CodecResult<(&'a [u8], &'a [u8])> {
    if payload.len() < 4 {
        return Err(CodecError::malformed_payload(
            "payload shorter than the 4-byte xattr length prefix",
        ));
    }
    let mut prefix = &payload[..4];
    let total_len = prefix.get_u32() as usize;
    if total_len > payload.len() - 4 {
        return Err(CodecError::malformed_payload(format!(
            "declared xattr length {total_len} exceeds payload size {}",
            payload.len()
        )));
    }

    // The body starts immediately after the declared xattr region.
    let region_end = 4 + total_len;
    let body = &payload[region_end..];
    let mut value: &[u8] = &[];

    let mut cursor = 4usize;
    while cursor < region_end {
        if cursor + 4 > region_end {
            return Err(CodecError::malformed_payload(
                "xattr pair length field crosses the xattr region boundary",
            ));
        }
        let mut length_field = &payload[cursor..cursor + 4];
        let pair_len = length_field.get_u32() as usize;
        if pair_len == 0 {
            return Err(CodecError::malformed_payload("zero-length xattr pair"));
        }
        let pair_end = cursor + pair_len;
        if pair_end > region_end {
            return Err(CodecError::malformed_payload(format!(
                "xattr pair length {pair_len} overruns the xattr region",
            )));
        }

        let key_start = cursor + 4;
        let key_end = find_null(payload, key_start, pair_end).ok_or_else(|| {
            CodecError::malformed_payload("xattr key missing null terminator")
        })?;
        let value_start = key_end + 1;
        let value_end = find_null(payload, value_start, pair_end).ok_or_else(|| {
            CodecError::malformed_payload("xattr value missing null terminator")
        })?;

        if &payload[key_start..key_end] == target_key.as_bytes() {
            value = &payload[value_start..value_end];
        }

        cursor = pair_end;
    }

    Ok((body, value))
}

/// Builds a mutation payload from xattr pairs and a document body,
/// producing the wire layout consumed by [`decode_xattr_stream`].
///
/// Keys and values must not contain null bytes; the format uses
/// `0x00` as its terminator.
pub fn encode_xattr_stream(pairs: &[(&str, &[u8])], body: &[u8]) -> Vec<u8> {
    let total_len: usize = pairs
        .iter()
        .map(|(key, value)| 4 + key.len() + 1 + value.len() + 1)
        .sum();

    let mut buf = Vec::with_capacity(4 + total_len + body.len());
    buf.put_u32(total_len as u32);
    for (key, value) in pairs {
        let pair_len = 4 + key.len() + 1 + value.len() + 1;
        buf.put_u32(pair_len as u32);
        buf.put_slice(key.as_bytes());
        buf.put_u8(0);
        buf.put_slice(value);
        buf.put_u8(0);
    }
    buf.put_slice(body);
    buf
}

/// Position of the first null byte in `payload[start..end)`, as an
/// absolute offset.
fn find_null(payload: &[u8], start: usize, end: usize) -> Option<usize> {
    payload[start..end]
        .iter()
        .position(|&b| b == 0)
        .map(|pos| start + pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Builds the single-pair fixture byte by byte, independently of the
    /// encoder, mirroring the wire layout definition.
    fn single_pair_fixture() -> Vec<u8> {
        let key = b"_sync";
        let value = br#"{"seq":1}"#;
        let body = br#"{"value":"ABC"}"#;
        let pair_len = 4 + key.len() + value.len() + 2;

        let mut payload = Vec::new();
        payload.extend_from_slice(&(pair_len as u32).to_be_bytes());
        payload.extend_from_slice(&(pair_len as u32).to_be_bytes());
        payload.extend_from_slice(key);
        payload.push(0);
        payload.extend_from_slice(value);
        payload.push(0);
        payload.extend_from_slice(body);
        payload
    }

    #[test]
    fn decode_single_pair() {
        let payload = single_pair_fixture();
        let (body, value) = decode_xattr_stream("_sync", &payload).unwrap();
        assert_eq!(body, br#"{"value":"ABC"}"#);
        assert_eq!(value, br#"{"seq":1}"#);
    }

    #[test]
    fn decode_missing_key_is_not_an_error() {
        let payload = single_pair_fixture();
        let (body, value) = decode_xattr_stream("nonexistent", &payload).unwrap();
        assert_eq!(body, br#"{"value":"ABC"}"#);
        assert_eq!(value, b"");
    }

    #[test]
    fn decode_matches_later_pair_without_stopping_early() {
        let payload = encode_xattr_stream(
            &[
                ("_sync", br#"{"seq":7}"#.as_slice()),
                ("_meta", b"metadata".as_slice()),
                ("user.note", b"hello".as_slice()),
            ],
            b"body-bytes",
        );

        let (body, value) = decode_xattr_stream("user.note", &payload).unwrap();
        assert_eq!(body, b"body-bytes");
        assert_eq!(value, b"hello");

        let (body, value) = decode_xattr_stream("_meta", &payload).unwrap();
        assert_eq!(body, b"body-bytes");
        assert_eq!(value, b"metadata");
    }

    #[test]
    fn roundtrip_single_pair() {
        let payload = encode_xattr_stream(&[("_sync", br#"{"seq":1}"#.as_slice())], b"the body");
        let (body, value) = decode_xattr_stream("_sync", &payload).unwrap();
        assert_eq!(body, b"the body");
        assert_eq!(value, br#"{"seq":1}"#);
    }

    #[test]
    fn empty_xattr_region_yields_body_only() {
        let payload = encode_xattr_stream(&[], b"just a body");
        let (body, value) = decode_xattr_stream("_sync", &payload).unwrap();
        assert_eq!(body, b"just a body");
        assert_eq!(value, b"");
    }

    #[test]
    fn declared_length_exceeding_buffer_is_malformed() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&100u32.to_be_bytes());
        payload.extend_from_slice(b"short");
        let err = decode_xattr_stream("_sync", &payload).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload { .. }));
    }

    #[test]
    fn truncated_length_prefix_is_malformed() {
        let err = decode_xattr_stream("_sync", &[0, 0]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload { .. }));
    }

    #[test]
    fn zero_pair_length_is_malformed() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&8u32.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&[1, 2, 3, 4]);
        let err = decode_xattr_stream("_sync", &payload).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload { .. }));
    }

    #[test]
    fn pair_overrunning_region_is_malformed() {
        // Pair claims 64 bytes inside an 8-byte region.
        let mut payload = Vec::new();
        payload.extend_from_slice(&8u32.to_be_bytes());
        payload.extend_from_slice(&64u32.to_be_bytes());
        payload.extend_from_slice(&[b'k', 0, b'v', 0]);
        let err = decode_xattr_stream("_sync", &payload).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload { .. }));
    }

    #[test]
    fn missing_null_terminator_is_malformed() {
        // Pair of the right length with no null bytes at all.
        let mut payload = Vec::new();
        payload.extend_from_slice(&10u32.to_be_bytes());
        payload.extend_from_slice(&10u32.to_be_bytes());
        payload.extend_from_slice(b"keyval");
        let err = decode_xattr_stream("_sync", &payload).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload { .. }));
    }

    #[test]
    fn short_read_of_xattr_region_is_malformed() {
        // One 12-byte pair inside a region declared as 15 bytes: the
        // trailing 3 bytes cannot hold another length field.
        let mut payload = Vec::new();
        payload.extend_from_slice(&15u32.to_be_bytes());
        payload.extend_from_slice(&12u32.to_be_bytes());
        payload.extend_from_slice(&[b'k', 0, b'v', b'a', b'l', b'u', b'e', 0]);
        payload.extend_from_slice(&[9, 9, 9]);
        payload.extend_from_slice(b"body");
        let err = decode_xattr_stream("_sync", &payload).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload { .. }));
    }

    proptest! {
        #[test]
        fn any_present_key_decodes_to_its_value(
            pairs in prop::collection::btree_map(
                "[a-z_][a-z0-9._]{0,11}",
                prop::collection::vec(1u8..=255, 0..48),
                0..5,
            ),
            body in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let owned: Vec<(&str, &[u8])> = pairs
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_slice()))
                .collect();
            let payload = encode_xattr_stream(&owned, &body);

            for (key, expected) in &pairs {
                let (decoded_body, value) = decode_xattr_stream(key, &payload).unwrap();
                prop_assert_eq!(decoded_body, body.as_slice());
                prop_assert_eq!(value, expected.as_slice());
            }

            let (decoded_body, value) = decode_xattr_stream("@@absent@@", &payload).unwrap();
            prop_assert_eq!(decoded_body, body.as_slice());
            prop_assert_eq!(value, b"".as_slice());
        }
    }
}
