//! CAS version token decoding.

use crate::error::{CodecError, CodecResult};

/// Decodes the textual CAS identifier attached to a stored document into
/// its monotonically comparable 64-bit form.
///
/// The storage engine serializes CAS values byte-swapped: the text is
/// `0x` followed by exactly 16 hex digits, and the internally monotonic
/// comparison value is recovered by reversing the byte order of the
/// parsed integer.
///
/// # Errors
///
/// Returns [`CodecError::InvalidCasFormat`] if the prefix is missing,
/// the digit count is wrong, or a character is not a hex digit.
pub fn decode_cas(cas: &str) -> CodecResult<u64> {
    let digits = cas
        .strip_prefix("0x")
        .ok_or_else(|| CodecError::invalid_cas_format("missing 0x prefix"))?;
    if digits.len() != 16 {
        return Err(CodecError::invalid_cas_format(format!(
            "expected 16 hex digits, got {}",
            digits.len()
        )));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::invalid_cas_format("non-hex digit in CAS value"));
    }
    // from_str_radix tolerates a leading sign; the hexdigit check above
    // already rejected it.
    let raw = u64::from_str_radix(digits, 16)
        .map_err(|_| CodecError::invalid_cas_format("unparseable CAS value"))?;
    Ok(raw.swap_bytes())
}
