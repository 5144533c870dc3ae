//! Core protocol types for Gambit's wire format.
//!
//! Every structure in this module travels "on the wire": it is serialized
//! by a [`Codec`](crate::Codec), sent over the connection, and decoded on
//! the other side. Field names are camelCase on the wire (`roomId`,
//! `baseFingerprint`) and event names are snake_case (`offer_received`),
//! because that is what browser clients expect.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// An ephemeral identifier for one connection.
///
/// Issued by the server when a socket is accepted and discarded when it
/// closes. There is no identity beyond this: a participant who reconnects
/// gets a brand-new id.
///
/// `#[serde(transparent)]` serializes `SessionId("ab12")` as just `"ab12"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A client-chosen room name (e.g. `"R1"`).
///
/// Rooms are created implicitly by the first join, so the id is whatever
/// string the participants agreed on out of band.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Unique id of a single proposal. A fresh one is minted per `propose`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub String);

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O-{}", self.0)
    }
}

impl From<&str> for OfferId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// An exact, comparable encoding of a position: piece placement, side to
/// move, castling rights and en-passant square (FEN).
///
/// Two fingerprints are equal iff the game-relevant state is identical.
/// The session layer never parses it; it only compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Game vocabulary
// ---------------------------------------------------------------------------

/// Side colour. Derived purely from a participant's index in the room:
/// index 0 is white, index 1 is black.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Maps a participant index to a colour. `None` past the second seat.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::White),
            1 => Some(Self::Black),
            _ => None,
        }
    }

    /// The seat index this colour occupies.
    pub fn index(self) -> usize {
        match self {
            Self::White => 0,
            Self::Black => 1,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => f.write_str("white"),
            Self::Black => f.write_str("black"),
        }
    }
}

/// Which rule set a game is played under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantTag {
    /// One ply per turn.
    #[default]
    Standard,
    /// Up to two plies per turn; a checking first ply ends the turn.
    TwoStep,
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::TwoStep => f.write_str("two_step"),
        }
    }
}

/// Variant-specific state attached to each position snapshot.
///
/// Only the rule engine interprets it. For the two-step variant
/// `turn_step` is 0 while the first half-move of a turn is pending and 1
/// while the second is; the standard variant always leaves it at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantState {
    #[serde(default)]
    pub turn_step: u8,
}

impl VariantState {
    /// The sub-state every turn starts in.
    pub const INITIAL: Self = Self { turn_step: 0 };

    pub fn is_initial(&self) -> bool {
        *self == Self::INITIAL
    }
}

/// Piece kinds as they appear in move records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// The two kinds of proposal a participant can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferKind {
    Undo,
    Draw,
}

impl fmt::Display for OfferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undo => f.write_str("undo"),
            Self::Draw => f.write_str("draw"),
        }
    }
}

impl FromStr for OfferKind {
    type Err = String;

    /// Accepts `undo`/`draw` in any case. Anything else is a bad request,
    /// which is why inbound offers carry the kind as a raw string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "undo" => Ok(Self::Undo),
            "draw" => Ok(Self::Draw),
            other => Err(format!("unknown offer kind {other:?}")),
        }
    }
}

/// Why a participant is no longer in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    /// Explicit `leave_room`, or switching to another room.
    Left,
    /// The connection closed or timed out.
    Disconnect,
}

impl fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Disconnect => f.write_str("disconnect"),
        }
    }
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// Canonical record of one applied ply, produced by the sender's engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    /// Origin square in algebraic notation (`"e2"`).
    pub from: String,
    /// Destination square (`"e4"`).
    pub to: String,
    pub piece: PieceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<PieceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
    /// Whether the ply left the opponent in check.
    #[serde(default)]
    pub check: bool,
}

/// Body of `make_move`, relayed verbatim to the other participant.
///
/// The session layer reads `room_id` (routing) and `variant_tag` (undo
/// clamping) and nothing else. `position` is trusted as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub room_id: RoomId,
    #[serde(rename = "move")]
    pub mv: MoveRecord,
    pub position: Fingerprint,
    #[serde(default)]
    pub variant_tag: VariantTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_state: Option<VariantState>,
}

// ---------------------------------------------------------------------------
// Recipient: who should receive a broadcast?
// ---------------------------------------------------------------------------

/// Addressing for a broadcast, resolved against a room's participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every participant in the room.
    All,
    /// One specific participant.
    Session(SessionId),
    /// Everyone except the given participant.
    AllExcept(SessionId),
}

impl Recipient {
    /// Resolves the recipient against the current participant list.
    pub fn resolve(&self, participants: &[SessionId]) -> Vec<SessionId> {
        match self {
            Self::All => participants.to_vec(),
            Self::Session(id) => participants
                .iter()
                .filter(|p| *p == id)
                .cloned()
                .collect(),
            Self::AllExcept(excluded) => participants
                .iter()
                .filter(|p| *p != excluded)
                .cloned()
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Requests a peer sends to the session layer.
///
/// Internally tagged by `event`:
/// `{ "event": "join_room", "roomId": "R1" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinRoom {
        room_id: RoomId,
    },

    LeaveRoom {
        room_id: RoomId,
    },

    /// Propose an undo or a draw. `kind` stays a raw string so an
    /// unsupported kind reaches the coordinator and is answered with
    /// `BAD_REQUEST` instead of failing to decode.
    OfferAction {
        room_id: RoomId,
        kind: String,
        #[serde(default)]
        from_color: Option<Color>,
        /// Any integer; the coordinator clamps it to the room's variant.
        #[serde(default)]
        plies: Option<i64>,
        #[serde(default)]
        base_fingerprint: Option<Fingerprint>,
    },

    RespondOffer {
        room_id: RoomId,
        offer_id: OfferId,
        accept: bool,
        #[serde(default)]
        current_fingerprint: Option<Fingerprint>,
    },

    MakeMove(MovePayload),

    ResetGame {
        room_id: RoomId,
    },

    ResignGame {
        room_id: RoomId,
        color: Color,
    },
}

impl ClientEvent {
    /// The room this request is about.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::JoinRoom { room_id }
            | Self::LeaveRoom { room_id }
            | Self::OfferAction { room_id, .. }
            | Self::RespondOffer { room_id, .. }
            | Self::ResetGame { room_id }
            | Self::ResignGame { room_id, .. } => room_id,
            Self::MakeMove(payload) => &payload.room_id,
        }
    }

    /// The snake_case event name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::OfferAction { .. } => "offer_action",
            Self::RespondOffer { .. } => "respond_offer",
            Self::MakeMove(_) => "make_move",
            Self::ResetGame { .. } => "reset_game",
            Self::ResignGame { .. } => "resign_game",
        }
    }
}

/// Broadcasts the session layer pushes to room members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Membership changed.
    RoomInfo {
        room_id: RoomId,
        player_count: usize,
    },

    OpponentLeft {
        room_id: RoomId,
        peer_id: SessionId,
        reason: LeaveReason,
    },

    /// Sent to the non-proposer only.
    OfferReceived {
        offer_id: OfferId,
        kind: OfferKind,
        from_color: Color,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plies: Option<u8>,
    },

    OfferResult {
        offer_id: OfferId,
        kind: OfferKind,
        accept: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorCode>,
    },

    UndoCommitted {
        offer_id: OfferId,
        plies: u8,
    },

    DrawCommitted {
        offer_id: OfferId,
    },

    /// The other participant's `make_move`, untouched.
    MoveMade(MovePayload),

    GameReset {
        room_id: RoomId,
    },

    PlayerResigned {
        room_id: RoomId,
        color: Color,
    },
}

// ---------------------------------------------------------------------------
// Errors and replies
// ---------------------------------------------------------------------------

/// Structured failure codes surfaced on the triggering call.
///
/// All of them are local and recoverable: the room stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RoomFull,
    BadRequest,
    OpponentNotPresent,
    OfferPending,
    OfferNotFound,
    CannotAcceptOwn,
    OfferStale,
    OfferRejectedByMove,
    IllegalMove,
    NoHistory,
    /// The sender does not occupy the room the request names.
    NotInRoom,
    /// The dispatcher is shutting down or gone.
    Unavailable,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoomFull => "ROOM_FULL",
            Self::BadRequest => "BAD_REQUEST",
            Self::OpponentNotPresent => "OPPONENT_NOT_PRESENT",
            Self::OfferPending => "OFFER_PENDING",
            Self::OfferNotFound => "OFFER_NOT_FOUND",
            Self::CannotAcceptOwn => "CANNOT_ACCEPT_OWN",
            Self::OfferStale => "OFFER_STALE",
            Self::OfferRejectedByMove => "OFFER_REJECTED_BY_MOVE",
            Self::IllegalMove => "ILLEGAL_MOVE",
            Self::NoHistory => "NO_HISTORY",
            Self::NotInRoom => "NOT_IN_ROOM",
            Self::Unavailable => "UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Success data carried by a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ReplyData {
    /// `join_room` succeeded.
    Joined { color: Color, index: usize },
    /// `offer_action` succeeded.
    OfferCreated { offer_id: OfferId },
    /// Everything else that succeeds without data.
    Ack,
}

/// The direct answer to one request, correlated by the request's `seq`.
///
/// Shaped as `{ "re": 3, "ok": true, "data": {...} }` or
/// `{ "re": 3, "ok": false, "error": "ROOM_FULL" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub re: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ReplyData>,
}

impl Reply {
    pub fn from_result(re: u64, result: Result<ReplyData, ErrorCode>) -> Self {
        match result {
            Ok(data) => Self {
                re,
                ok: true,
                error: None,
                data: Some(data),
            },
            Err(code) => Self {
                re,
                ok: false,
                error: Some(code),
                data: None,
            },
        }
    }

    /// Converts back into a `Result`. A failed reply without a code is
    /// treated as `BAD_REQUEST`.
    pub fn into_result(self) -> Result<ReplyData, ErrorCode> {
        if self.ok {
            Ok(self.data.unwrap_or(ReplyData::Ack))
        } else {
            Err(self.error.unwrap_or(ErrorCode::BadRequest))
        }
    }
}

// ---------------------------------------------------------------------------
// Payload and Envelope
// ---------------------------------------------------------------------------

/// What's inside an envelope.
///
/// Adjacently tagged: `{ "type": "Request", "data": { "event": ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum Payload {
    /// Server → Client, first frame: the session id for this connection.
    Welcome {
        session_id: SessionId,
        protocol_version: u32,
    },

    /// Client → Server keep-alive. Resets the idle timer.
    Heartbeat { client_time: u64 },

    /// Server → Client echo of a heartbeat.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Client → Server.
    Request(ClientEvent),

    /// Server → Client answer to a request.
    Reply(Reply),

    /// Server → Client broadcast.
    Event(ServerEvent),
}

/// The top-level frame. Every message on the wire is an Envelope.
///
/// `seq` is per-sender and monotonically increasing; replies echo the
/// request's `seq` in [`Reply::re`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,

    /// Milliseconds since the sender's connection started.
    #[serde(default)]
    pub timestamp: u64,

    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================
