//! Error types for the protocol layer.
//!
//! Each crate in Gambit defines its own error enum, so a `ProtocolError`
//! always means serialization trouble, never networking or room rules.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing required fields,
    /// wrong data types, or an unknown event name.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but breaks a protocol rule, e.g. a client
    /// sending a `Reply` or a server-only `Event`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
