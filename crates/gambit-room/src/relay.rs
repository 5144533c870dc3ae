//! Forwarding moves between the two participants of a room.

use gambit_protocol::{MovePayload, Recipient, ServerEvent, SessionId};

use crate::registry::{Room, not_in_room};
use crate::{OfferCoordinator, Outcome};

/// Relays `make_move` payloads.
///
/// The relay never looks at the board: the position in the payload is
/// whatever the sender's engine produced, and the receiving peer decides
/// what to do with it.
#[derive(Debug, Default)]
pub struct MoveRelay {
    relayed: u64,
}

impl MoveRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the offer coordinator react to the move, then forwards the
    /// payload unchanged to everyone but the sender.
    pub fn relay(
        &mut self,
        room: &Room,
        offers: &mut OfferCoordinator,
        sender: &SessionId,
        payload: MovePayload,
    ) -> Outcome<()> {
        if !room.contains(sender) {
            return Outcome::fail(not_in_room(room.id(), sender));
        }

        let mut outcome = Outcome::ok(());
        let _ = outcome.absorb(offers.on_move(room));

        tracing::debug!(
            room_id = %room.id(),
            %sender,
            from = %payload.mv.from,
            to = %payload.mv.to,
            "move relayed"
        );
        self.relayed += 1;
        outcome.push(
            Recipient::AllExcept(sender.clone()),
            room.participants(),
            ServerEvent::MoveMade(payload),
        );
        outcome
    }

    /// Moves forwarded since start-up.
    pub fn relayed(&self) -> u64 {
        self.relayed
    }
}
