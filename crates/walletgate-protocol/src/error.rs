//! Error types for the protocol layer.
//!
//! Each crate in walletgate defines its own error enum. When you see a
//! `ProtocolError`, the problem is in serialization, not in the provider
//! or the storage medium.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    ///
    /// The inner `serde_json::Error` is the original error from serde_json.
    /// We wrap it so callers deal with `ProtocolError` uniformly,
    /// regardless of which codec produced the error.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: a record written by an older version, a truncated
    /// write, or a hand-edited storage entry.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The record decoded but is not usable, e.g. a session with an empty
    /// address.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
