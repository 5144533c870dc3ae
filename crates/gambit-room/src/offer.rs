//! Undo and draw negotiation: one pending offer per room.
//!
//! ```text
//!          propose()                respond(accept) ──→ committed
//!   Idle ────────────→ Pending ──→ respond(reject)  ──→ rejected
//!    ↑                    │        respond(stale)   ──→ OFFER_STALE
//!    │                    │        on_move (undo)   ──→ OFFER_REJECTED_BY_MOVE
//!    └────────────────────┘        room deleted
//! ```

use std::collections::HashMap;

use gambit_protocol::{
    Color, ErrorCode, Fingerprint, OfferId, OfferKind, Recipient, RoomId, ServerEvent, SessionId,
};
use gambit_rules::Variant;
use rand::Rng;

use crate::registry::{Room, not_in_room};
use crate::{Outcome, RoomError};

/// The single outstanding proposal of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOffer {
    pub id: OfferId,
    pub kind: OfferKind,
    pub proposer: SessionId,
    pub proposer_color: Color,
    /// Undo only, already clamped to the room's variant.
    pub plies: Option<u8>,
    /// Undo only: the position the proposer was looking at.
    pub base_fingerprint: Option<Fingerprint>,
}

/// An `offer_action` as it arrives from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    /// Raw kind text; anything but `undo`/`draw` is a bad request.
    pub kind: String,
    pub from_color: Option<Color>,
    /// Raw request; clamped when the offer opens.
    pub plies: Option<i64>,
    pub base_fingerprint: Option<Fingerprint>,
}

/// An answer to a pending offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub offer_id: OfferId,
    pub accept: bool,
    pub current_fingerprint: Option<Fingerprint>,
}

/// Owns every room's pending offer.
#[derive(Debug, Default)]
pub struct OfferCoordinator {
    offers: HashMap<RoomId, PendingOffer>,
}

impl OfferCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an offer in `room` on behalf of `proposer`. Only the other
    /// participant is told about it.
    pub fn propose(&mut self, room: &Room, proposer: &SessionId, proposal: Proposal) -> Outcome<OfferId> {
        let room_id = room.id();

        let kind: OfferKind = match proposal.kind.parse() {
            Ok(kind) => kind,
            Err(reason) => return Outcome::fail(RoomError::BadRequest(reason)),
        };
        if kind == OfferKind::Undo && proposal.base_fingerprint.is_none() {
            return Outcome::fail(RoomError::BadRequest(
                "undo offer without baseFingerprint".to_string(),
            ));
        }
        let Some(seat) = room.seat_of(proposer) else {
            return Outcome::fail(not_in_room(room_id, proposer));
        };
        if room.participants().len() < 2 {
            return Outcome::fail(RoomError::OpponentNotPresent(room_id.clone()));
        }
        if self.offers.contains_key(room_id) {
            return Outcome::fail(RoomError::OfferPending(room_id.clone()));
        }

        if let Some(claimed) = proposal.from_color {
            if claimed != seat.color {
                tracing::warn!(
                    %room_id,
                    %proposer,
                    %claimed,
                    seated = %seat.color,
                    "offer colour disagrees with seat, using seat"
                );
            }
        }

        let plies = match kind {
            OfferKind::Undo => Some(Variant::from_tag(room.variant()).clamp_undo_plies(proposal.plies)),
            OfferKind::Draw => None,
        };
        let offer = PendingOffer {
            id: OfferId(generate_offer_id()),
            kind,
            proposer: proposer.clone(),
            proposer_color: seat.color,
            plies,
            base_fingerprint: match kind {
                OfferKind::Undo => proposal.base_fingerprint,
                OfferKind::Draw => None,
            },
        };
        let offer_id = offer.id.clone();

        tracing::info!(%room_id, %proposer, %kind, offer_id = %offer_id, ?plies, "offer opened");

        let notice = ServerEvent::OfferReceived {
            offer_id: offer_id.clone(),
            kind,
            from_color: seat.color,
            plies,
        };
        self.offers.insert(room_id.clone(), offer);

        Outcome::ok(offer_id).broadcast(
            Recipient::AllExcept(proposer.clone()),
            room.participants(),
            notice,
        )
    }

    /// Resolves the pending offer of `room`.
    ///
    /// Accepting an undo requires `current_fingerprint` to equal the
    /// offer's base; otherwise the offer is dropped as stale, the room is
    /// told, and the call fails.
    pub fn respond(&mut self, room: &Room, responder: &SessionId, response: Response) -> Outcome<()> {
        let room_id = room.id();

        let Some(offer) = self
            .offers
            .get(room_id)
            .filter(|offer| offer.id == response.offer_id)
        else {
            return Outcome::fail(RoomError::OfferNotFound(response.offer_id));
        };
        if &offer.proposer == responder {
            return Outcome::fail(RoomError::CannotAcceptOwn(response.offer_id));
        }

        let stale = response.accept
            && offer.kind == OfferKind::Undo
            && response.current_fingerprint.is_none_or(|current| {
                offer.base_fingerprint.as_ref() != Some(&current)
            });

        let Some(offer) = self.offers.remove(room_id) else {
            return Outcome::fail(RoomError::OfferNotFound(response.offer_id));
        };

        if stale {
            tracing::warn!(%room_id, offer_id = %offer.id, "undo accepted against a different position, dropped as stale");
            return Outcome::fail(RoomError::OfferStale(offer.id.clone())).broadcast(
                Recipient::All,
                room.participants(),
                ServerEvent::OfferResult {
                    offer_id: offer.id,
                    kind: offer.kind,
                    accept: false,
                    error: Some(ErrorCode::OfferStale),
                },
            );
        }

        tracing::info!(
            %room_id,
            offer_id = %offer.id,
            kind = %offer.kind,
            accept = response.accept,
            "offer resolved"
        );

        let mut outcome = Outcome::ok(()).broadcast(
            Recipient::All,
            room.participants(),
            ServerEvent::OfferResult {
                offer_id: offer.id.clone(),
                kind: offer.kind,
                accept: response.accept,
                error: None,
            },
        );
        if response.accept {
            let commit = match offer.kind {
                OfferKind::Undo => ServerEvent::UndoCommitted {
                    offer_id: offer.id,
                    plies: offer.plies.unwrap_or(1),
                },
                OfferKind::Draw => ServerEvent::DrawCommitted { offer_id: offer.id },
            };
            outcome.push(Recipient::All, room.participants(), commit);
        }
        outcome
    }

    /// A move arrived in `room`. A pending undo no longer refers to the
    /// current game and is dropped; a pending draw is left alone.
    pub fn on_move(&mut self, room: &Room) -> Outcome<()> {
        let room_id = room.id();
        let is_undo = self
            .offers
            .get(room_id)
            .is_some_and(|offer| offer.kind == OfferKind::Undo);
        if !is_undo {
            return Outcome::ok(());
        }
        let Some(offer) = self.offers.remove(room_id) else {
            return Outcome::ok(());
        };

        tracing::info!(%room_id, offer_id = %offer.id, "undo offer superseded by move");
        Outcome::ok(()).broadcast(
            Recipient::All,
            room.participants(),
            ServerEvent::OfferResult {
                offer_id: offer.id,
                kind: offer.kind,
                accept: false,
                error: Some(ErrorCode::OfferRejectedByMove),
            },
        )
    }

    /// Drops the offer of `room_id` without telling anyone.
    pub fn remove(&mut self, room_id: &RoomId) -> Option<PendingOffer> {
        self.offers.remove(room_id)
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&PendingOffer> {
        self.offers.get(room_id)
    }

    /// Number of rooms with an offer outstanding.
    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

/// 64 random bits as 16 hex characters.
fn generate_offer_id() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionRegistry;
    use gambit_protocol::VariantTag;

    fn sid(s: &str) -> SessionId {
        SessionId::from(s)
    }

    fn r1() -> RoomId {
        RoomId::from("R1")
    }

    fn full_room() -> SessionRegistry {
        let mut reg = SessionRegistry::new(2);
        let _ = reg.join(&r1(), &sid("a"));
        let _ = reg.join(&r1(), &sid("b"));
        reg
    }

    fn undo(plies: Option<i64>, base: &str) -> Proposal {
        Proposal {
            kind: "undo".to_string(),
            from_color: None,
            plies,
            base_fingerprint: Some(Fingerprint::from(base)),
        }
    }

    fn draw() -> Proposal {
        Proposal {
            kind: "draw".to_string(),
            from_color: None,
            plies: None,
            base_fingerprint: None,
        }
    }

    fn accept(offer_id: &OfferId, current: Option<&str>) -> Response {
        Response {
            offer_id: offer_id.clone(),
            accept: true,
            current_fingerprint: current.map(Fingerprint::from),
        }
    }

    // =====================================================================
    // propose()
    // =====================================================================

    #[test]
    fn test_propose_unknown_kind_returns_bad_request() {
        let reg = full_room();
        let mut offers = OfferCoordinator::new();
        let proposal = Proposal {
            kind: "rematch".to_string(),
            ..draw()
        };

        let outcome = offers.propose(reg.get(&r1()).unwrap(), &sid("a"), proposal);

        assert!(matches!(outcome.reply, Err(RoomError::BadRequest(_))));
        assert!(offers.is_empty());
    }

    #[test]
    fn test_propose_undo_without_base_returns_bad_request() {
        let reg = full_room();
        let mut offers = OfferCoordinator::new();
        let proposal = Proposal {
            base_fingerprint: None,
            ..undo(Some(1), "f1")
        };

        let outcome = offers.propose(reg.get(&r1()).unwrap(), &sid("a"), proposal);

        assert_eq!(outcome.reply.unwrap_err().code(), ErrorCode::BadRequest);
    }

    #[test]
    fn test_propose_alone_returns_opponent_not_present() {
        let mut reg = SessionRegistry::new(2);
        let _ = reg.join(&r1(), &sid("a"));
        let mut offers = OfferCoordinator::new();

        let outcome = offers.propose(reg.get(&r1()).unwrap(), &sid("a"), draw());

        assert_eq!(outcome.reply, Err(RoomError::OpponentNotPresent(r1())));
    }

    #[test]
    fn test_propose_second_offer_returns_offer_pending() {
        let reg = full_room();
        let room = reg.get(&r1()).unwrap();
        let mut offers = OfferCoordinator::new();
        offers.propose(room, &sid("a"), draw()).reply.unwrap();

        let outcome = offers.propose(room, &sid("b"), undo(None, "f0"));

        assert_eq!(outcome.reply, Err(RoomError::OfferPending(r1())));
        assert_eq!(offers.len(), 1);
    }

    #[test]
    fn test_propose_notifies_only_the_other_participant() {
        let reg = full_room();
        let mut offers = OfferCoordinator::new();

        let outcome = offers.propose(reg.get(&r1()).unwrap(), &sid("b"), undo(Some(1), "f1"));

        let offer_id = outcome.reply.clone().unwrap();
        assert!(outcome.events_for(&sid("b")).is_empty());
        assert_eq!(
            outcome.events_for(&sid("a")),
            vec![&ServerEvent::OfferReceived {
                offer_id,
                kind: OfferKind::Undo,
                from_color: Color::Black,
                plies: Some(1),
            }]
        );
    }

    #[test]
    fn test_propose_clamps_plies_to_variant() {
        let mut reg = full_room();
        let mut offers = OfferCoordinator::new();
        let _ = offers.propose(reg.get(&r1()).unwrap(), &sid("a"), undo(Some(9), "f"));
        assert_eq!(offers.get(&r1()).unwrap().plies, Some(2));

        offers.remove(&r1());
        reg.set_variant(&r1(), VariantTag::TwoStep);
        let _ = offers.propose(reg.get(&r1()).unwrap(), &sid("a"), undo(Some(9), "f"));
        assert_eq!(offers.get(&r1()).unwrap().plies, Some(4));

        offers.remove(&r1());
        let _ = offers.propose(reg.get(&r1()).unwrap(), &sid("a"), undo(Some(0), "f"));
        assert_eq!(offers.get(&r1()).unwrap().plies, Some(1));

        offers.remove(&r1());
        let _ = offers.propose(reg.get(&r1()).unwrap(), &sid("a"), undo(Some(300), "f"));
        assert_eq!(offers.get(&r1()).unwrap().plies, Some(4));

        offers.remove(&r1());
        let _ = offers.propose(reg.get(&r1()).unwrap(), &sid("a"), undo(Some(-1), "f"));
        assert_eq!(offers.get(&r1()).unwrap().plies, Some(1));
    }

    #[test]
    fn test_propose_seat_color_overrides_claimed_color() {
        let reg = full_room();
        let mut offers = OfferCoordinator::new();
        let proposal = Proposal {
            from_color: Some(Color::Black),
            ..draw()
        };

        let _ = offers.propose(reg.get(&r1()).unwrap(), &sid("a"), proposal);

        assert_eq!(offers.get(&r1()).unwrap().proposer_color, Color::White);
    }

    // =====================================================================
    // respond()
    // =====================================================================

    #[test]
    fn test_respond_wrong_id_returns_offer_not_found() {
        let reg = full_room();
        let room = reg.get(&r1()).unwrap();
        let mut offers = OfferCoordinator::new();
        offers.propose(room, &sid("a"), draw()).reply.unwrap();

        let outcome = offers.respond(room, &sid("b"), accept(&OfferId::from("nope"), None));

        assert!(matches!(outcome.reply, Err(RoomError::OfferNotFound(_))));
        assert_eq!(offers.len(), 1);
    }

    #[test]
    fn test_respond_by_proposer_returns_cannot_accept_own() {
        let reg = full_room();
        let room = reg.get(&r1()).unwrap();
        let mut offers = OfferCoordinator::new();
        let id = offers.propose(room, &sid("a"), draw()).reply.unwrap();

        let outcome = offers.respond(room, &sid("a"), accept(&id, None));

        assert_eq!(outcome.reply, Err(RoomError::CannotAcceptOwn(id)));
        assert_eq!(offers.len(), 1);
    }

    #[test]
    fn test_respond_accept_matching_undo_commits() {
        let reg = full_room();
        let room = reg.get(&r1()).unwrap();
        let mut offers = OfferCoordinator::new();
        let id = offers.propose(room, &sid("b"), undo(Some(1), "f1")).reply.unwrap();

        let outcome = offers.respond(room, &sid("a"), accept(&id, Some("f1")));

        assert_eq!(outcome.reply, Ok(()));
        assert!(offers.is_empty());
        for who in ["a", "b"] {
            assert_eq!(
                outcome.events_for(&sid(who)),
                vec![
                    &ServerEvent::OfferResult {
                        offer_id: id.clone(),
                        kind: OfferKind::Undo,
                        accept: true,
                        error: None,
                    },
                    &ServerEvent::UndoCommitted {
                        offer_id: id.clone(),
                        plies: 1,
                    },
                ]
            );
        }
    }

    #[test]
    fn test_respond_accept_mismatched_undo_is_stale() {
        let reg = full_room();
        let room = reg.get(&r1()).unwrap();
        let mut offers = OfferCoordinator::new();
        let id = offers.propose(room, &sid("b"), undo(Some(1), "f1")).reply.unwrap();

        let outcome = offers.respond(room, &sid("a"), accept(&id, Some("f2")));

        assert_eq!(outcome.reply, Err(RoomError::OfferStale(id.clone())));
        assert!(offers.is_empty());
        assert_eq!(
            outcome.events_for(&sid("b")),
            vec![&ServerEvent::OfferResult {
                offer_id: id,
                kind: OfferKind::Undo,
                accept: false,
                error: Some(ErrorCode::OfferStale),
            }]
        );
    }

    #[test]
    fn test_respond_accept_undo_without_current_is_stale() {
        let reg = full_room();
        let room = reg.get(&r1()).unwrap();
        let mut offers = OfferCoordinator::new();
        let id = offers.propose(room, &sid("b"), undo(Some(1), "f1")).reply.unwrap();

        let outcome = offers.respond(room, &sid("a"), accept(&id, None));

        assert_eq!(outcome.reply.unwrap_err().code(), ErrorCode::OfferStale);
    }

    #[test]
    fn test_respond_reject_undo_ignores_fingerprint() {
        let reg = full_room();
        let room = reg.get(&r1()).unwrap();
        let mut offers = OfferCoordinator::new();
        let id = offers.propose(room, &sid("b"), undo(Some(1), "f1")).reply.unwrap();

        let outcome = offers.respond(
            room,
            &sid("a"),
            Response {
                offer_id: id.clone(),
                accept: false,
                current_fingerprint: None,
            },
        );

        assert_eq!(outcome.reply, Ok(()));
        assert_eq!(outcome.events_for(&sid("b")).len(), 1);
        assert!(offers.is_empty());
    }

    #[test]
    fn test_respond_accept_draw_commits() {
        let reg = full_room();
        let room = reg.get(&r1()).unwrap();
        let mut offers = OfferCoordinator::new();
        let id = offers.propose(room, &sid("a"), draw()).reply.unwrap();

        let outcome = offers.respond(room, &sid("b"), accept(&id, None));

        assert_eq!(outcome.reply, Ok(()));
        assert_eq!(
            outcome.events_for(&sid("a")).last(),
            Some(&&ServerEvent::DrawCommitted { offer_id: id })
        );
    }

    // =====================================================================
    // on_move()
    // =====================================================================

    #[test]
    fn test_on_move_clears_undo() {
        let reg = full_room();
        let room = reg.get(&r1()).unwrap();
        let mut offers = OfferCoordinator::new();
        let id = offers.propose(room, &sid("b"), undo(Some(1), "f1")).reply.unwrap();

        let outcome = offers.on_move(room);

        assert!(offers.is_empty());
        assert_eq!(
            outcome.events_for(&sid("a")),
            vec![&ServerEvent::OfferResult {
                offer_id: id,
                kind: OfferKind::Undo,
                accept: false,
                error: Some(ErrorCode::OfferRejectedByMove),
            }]
        );
    }

    #[test]
    fn test_on_move_keeps_draw() {
        let reg = full_room();
        let room = reg.get(&r1()).unwrap();
        let mut offers = OfferCoordinator::new();
        offers.propose(room, &sid("a"), draw()).reply.unwrap();

        let outcome = offers.on_move(room);

        assert!(outcome.deliveries.is_empty());
        assert_eq!(offers.get(&r1()).unwrap().kind, OfferKind::Draw);
    }
}
