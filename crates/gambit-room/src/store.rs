//! The room store: registry, offers and relay behind one object.

use gambit_protocol::{
    ClientEvent, Color, LeaveReason, MovePayload, OfferId, Recipient, ReplyData, RoomId,
    ServerEvent, SessionId,
};

use crate::registry::{Departure, Seat};
use crate::{
    MoveRelay, OfferCoordinator, Outcome, Proposal, Response, RoomConfig, SessionRegistry,
};

/// All authoritative room state of one process.
///
/// Created once at start-up and injected into the dispatcher; tests build
/// as many independent stores as they like. Every operation checks that
/// the caller sits in the room it names before touching anything.
#[derive(Debug)]
pub struct RoomStore {
    registry: SessionRegistry,
    offers: OfferCoordinator,
    relay: MoveRelay,
}

impl RoomStore {
    pub fn new(config: &RoomConfig) -> Self {
        Self {
            registry: SessionRegistry::new(config.capacity),
            offers: OfferCoordinator::new(),
            relay: MoveRelay::new(),
        }
    }

    pub fn join(&mut self, room_id: &RoomId, session: &SessionId) -> Outcome<Seat> {
        self.registry.join(room_id, session)
    }

    /// Leaves `room_id`. When the room empties, its pending offer goes
    /// with it.
    pub fn leave(&mut self, room_id: &RoomId, session: &SessionId, reason: LeaveReason) -> Outcome<()> {
        let outcome = self.registry.leave(room_id, session, reason);
        if let Ok(Departure { room_deleted: true }) = outcome.reply {
            if let Some(offer) = self.offers.remove(room_id) {
                tracing::info!(%room_id, offer_id = %offer.id, "pending offer deleted with room");
            }
        }
        outcome.map(|_| ())
    }

    pub fn propose(&mut self, room_id: &RoomId, session: &SessionId, proposal: Proposal) -> Outcome<OfferId> {
        match self.registry.member_room(room_id, session) {
            Ok(room) => self.offers.propose(room, session, proposal),
            Err(e) => e.into(),
        }
    }

    pub fn respond(&mut self, room_id: &RoomId, session: &SessionId, response: Response) -> Outcome<()> {
        match self.registry.member_room(room_id, session) {
            Ok(room) => self.offers.respond(room, session, response),
            Err(e) => e.into(),
        }
    }

    /// Relays a move and remembers the variant it was played under.
    pub fn relay_move(&mut self, session: &SessionId, payload: MovePayload) -> Outcome<()> {
        let room_id = payload.room_id.clone();
        if let Err(e) = self.registry.member_room(&room_id, session) {
            return e.into();
        }
        self.registry.set_variant(&room_id, payload.variant_tag);
        match self.registry.member_room(&room_id, session) {
            Ok(room) => self.relay.relay(room, &mut self.offers, session, payload),
            Err(e) => e.into(),
        }
    }

    /// Broadcasts a fresh game. Any pending offer referred to the old one
    /// and is dropped.
    pub fn reset_game(&mut self, room_id: &RoomId, session: &SessionId) -> Outcome<()> {
        let room = match self.registry.member_room(room_id, session) {
            Ok(room) => room,
            Err(e) => return e.into(),
        };
        if let Some(offer) = self.offers.remove(room_id) {
            tracing::debug!(%room_id, offer_id = %offer.id, "pending offer dropped by reset");
        }
        tracing::info!(%room_id, %session, "game reset");
        Outcome::ok(()).broadcast(
            Recipient::All,
            room.participants(),
            ServerEvent::GameReset {
                room_id: room_id.clone(),
            },
        )
    }

    /// Broadcasts a resignation. Nothing is recorded: the game being over
    /// is the peers' business.
    pub fn resign(&mut self, room_id: &RoomId, session: &SessionId, claimed: Color) -> Outcome<()> {
        let room = match self.registry.member_room(room_id, session) {
            Ok(room) => room,
            Err(e) => return e.into(),
        };
        let color = match room.seat_of(session) {
            Some(seat) if seat.color != claimed => {
                tracing::warn!(%room_id, %session, %claimed, seated = %seat.color, "resign colour disagrees with seat, using seat");
                seat.color
            }
            _ => claimed,
        };
        tracing::info!(%room_id, %color, "player resigned");
        Outcome::ok(()).broadcast(
            Recipient::All,
            room.participants(),
            ServerEvent::PlayerResigned {
                room_id: room_id.clone(),
                color,
            },
        )
    }

    /// Runs one client request to completion.
    pub fn handle(&mut self, session: &SessionId, event: ClientEvent) -> Outcome<ReplyData> {
        match event {
            ClientEvent::JoinRoom { room_id } => self
                .join(&room_id, session)
                .map(|seat| ReplyData::Joined {
                    color: seat.color,
                    index: seat.index,
                }),
            ClientEvent::LeaveRoom { room_id } => self
                .leave(&room_id, session, LeaveReason::Left)
                .map(|_| ReplyData::Ack),
            ClientEvent::OfferAction {
                room_id,
                kind,
                from_color,
                plies,
                base_fingerprint,
            } => self
                .propose(
                    &room_id,
                    session,
                    Proposal {
                        kind,
                        from_color,
                        plies,
                        base_fingerprint,
                    },
                )
                .map(|offer_id| ReplyData::OfferCreated { offer_id }),
            ClientEvent::RespondOffer {
                room_id,
                offer_id,
                accept,
                current_fingerprint,
            } => self
                .respond(
                    &room_id,
                    session,
                    Response {
                        offer_id,
                        accept,
                        current_fingerprint,
                    },
                )
                .map(|_| ReplyData::Ack),
            ClientEvent::MakeMove(payload) => self.relay_move(session, payload).map(|_| ReplyData::Ack),
            ClientEvent::ResetGame { room_id } => {
                self.reset_game(&room_id, session).map(|_| ReplyData::Ack)
            }
            ClientEvent::ResignGame { room_id, color } => {
                self.resign(&room_id, session, color).map(|_| ReplyData::Ack)
            }
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn offers(&self) -> &OfferCoordinator {
        &self.offers
    }

    pub fn relay(&self) -> &MoveRelay {
        &self.relay
    }
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new(&RoomConfig::default())
    }
}
