//! Room configuration and occupancy state.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration for the room layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Participants per room. Colours are derived from seat index, so
    /// anything other than 2 leaves seats without a colour.
    pub capacity: usize,

    /// Bound of the dispatcher's command channel. When it fills up,
    /// connection handlers wait (backpressure).
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            channel_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// Occupancy of a live room, derived from its participant count.
///
/// ```text
/// (created) → WaitingForOpponent ⇄ Ready → (deleted when empty)
/// ```
///
/// A room with no participants does not exist, so there is no `Empty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    /// One seat taken. Offers are refused with `OPPONENT_NOT_PRESENT`.
    WaitingForOpponent,
    /// Every seat taken.
    Ready,
}

impl RoomState {
    pub fn from_occupancy(participants: usize, capacity: usize) -> Self {
        if participants >= capacity {
            Self::Ready
        } else {
            Self::WaitingForOpponent
        }
    }

    /// Returns `true` if another participant may join.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::WaitingForOpponent)
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForOpponent => write!(f, "WaitingForOpponent"),
            Self::Ready => write!(f, "Ready"),
        }
    }
}
