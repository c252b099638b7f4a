//! # SyncGate Codec
//!
//! Stateless micro-format codecs for the document sync layer.
//!
//! This crate provides:
//! - Decoding of the length-prefixed mutation payloads delivered by the
//!   database's change-notification stream (body + extended attributes)
//! - Decoding of textual CAS identifiers into monotonically comparable
//!   64-bit ordering values
//! - The per-document [`SyncMetadata`] control record and its grant types
//!
//! All operations here are pure functions over their input; nothing in
//! this crate holds shared state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cas;
mod error;
mod metadata;
mod xattr;

pub use cas::decode_cas;
pub use error::{CodecError, CodecResult};
pub use metadata::{AccessMap, ChannelGrant, ChannelMap, SyncMetadata, TimedSet};
pub use xattr::{decode_xattr_stream, encode_xattr_stream};

/// Name of the extended attribute that carries sync metadata.
pub const SYNC_XATTR_NAME: &str = "_sync";
