//! # Gambit
//!
//! A two-player chess session server. Peers join a shared room, relay
//! their moves through the server, and negotiate takebacks and draws
//! under a single-pending-offer rule.
//!
//! The server is authoritative for rooms and offers only: it never
//! re-validates a move. Each peer keeps its own rule engine and folds
//! the other side's positions into it (see [`PeerGame`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gambit::prelude::*;
//!
//! # async fn start() -> Result<(), GambitError> {
//! let server = GambitServer::builder()
//!     .config(ServerConfig::from_env())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod peer;
mod server;

pub use config::ServerConfig;
pub use error::GambitError;
pub use peer::{GameEnd, PeerGame, PeerUpdate};
pub use server::{GambitServer, GambitServerBuilder};

/// Everything needed to run a server or drive a peer.
pub mod prelude {
    pub use crate::{GambitError, GambitServer, GambitServerBuilder, GameEnd, PeerGame, PeerUpdate, ServerConfig};
    pub use gambit_protocol::{
        ClientEvent, Codec, Color, Envelope, ErrorCode, Fingerprint, JsonCodec, OfferId,
        OfferKind, Payload, Reply, ReplyData, RoomId, ServerEvent, SessionId, VariantTag,
        PROTOCOL_VERSION,
    };
    pub use gambit_room::{DispatcherStats, RoomConfig};
    pub use gambit_rules::{RuleEngine, SyncOutcome, TerminalReason};
}
