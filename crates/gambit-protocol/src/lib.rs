//! Wire protocol for Gambit.
//!
//! This crate defines the "language" that peers and the session server
//! speak:
//!
//! - **Types** ([`Envelope`], [`ClientEvent`], [`ServerEvent`],
//!   [`Reply`], [`ErrorCode`], ...): the frames that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those frames are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room dispatcher (events)
//! ```
//!
//! The rule engine also builds on these types: fingerprints, colours,
//! variant tags and move records are shared vocabulary between the
//! authoritative relay and each peer's local engine.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, Color, Envelope, ErrorCode, Fingerprint, LeaveReason,
    MovePayload, MoveRecord, OfferId, OfferKind, Payload, PieceKind,
    Recipient, Reply, ReplyData, RoomId, ServerEvent, SessionId,
    VariantState, VariantTag,
};

/// Protocol version announced in the `Welcome` frame.
pub const PROTOCOL_VERSION: u32 = 1;
