//! Room membership: who sits where, and what colour that makes them.

use std::collections::HashMap;

use gambit_protocol::{
    Color, LeaveReason, Recipient, RoomId, ServerEvent, SessionId, VariantTag,
};

use crate::{Outcome, RoomError, RoomState};

/// A seat in a room. Colour is derived from the index alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seat {
    pub index: usize,
    pub color: Color,
}

/// One live room.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    participants: Vec<SessionId>,
    capacity: usize,
    /// Variant last reported by a relayed move.
    variant: VariantTag,
}

impl Room {
    fn new(id: RoomId, capacity: usize) -> Self {
        Self {
            id,
            participants: Vec::with_capacity(capacity),
            capacity,
            variant: VariantTag::default(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Participants in seat order.
    pub fn participants(&self) -> &[SessionId] {
        &self.participants
    }

    pub fn contains(&self, session: &SessionId) -> bool {
        self.participants.contains(session)
    }

    /// Current seat of `session`, recomputed from its position.
    pub fn seat_of(&self, session: &SessionId) -> Option<Seat> {
        let index = self.participants.iter().position(|p| p == session)?;
        let color = Color::from_index(index)?;
        Some(Seat { index, color })
    }

    pub fn state(&self) -> RoomState {
        RoomState::from_occupancy(self.participants.len(), self.capacity)
    }

    pub fn variant(&self) -> VariantTag {
        self.variant
    }

    fn info(&self) -> ServerEvent {
        ServerEvent::RoomInfo {
            room_id: self.id.clone(),
            player_count: self.participants.len(),
        }
    }
}

/// Result of a successful leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// The room emptied and was deleted.
    pub room_deleted: bool,
}

/// Maps room ids to their ordered participants.
///
/// Rooms are created by the first join and deleted when the last
/// participant leaves.
#[derive(Debug)]
pub struct SessionRegistry {
    rooms: HashMap<RoomId, Room>,
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            capacity,
        }
    }

    /// Seats `session` in `room_id`, creating the room if absent, and
    /// tells the room its new head count.
    ///
    /// Joining a room the session already sits in returns its current
    /// seat without broadcasting.
    pub fn join(&mut self, room_id: &RoomId, session: &SessionId) -> Outcome<Seat> {
        let capacity = self.capacity;
        let created = !self.rooms.contains_key(room_id);
        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(room_id.clone(), capacity));

        if let Some(seat) = room.seat_of(session) {
            return Outcome::ok(seat);
        }
        if !room.state().is_joinable() {
            tracing::debug!(%room_id, %session, "join refused, room full");
            return Outcome::fail(RoomError::RoomFull(room_id.clone()));
        }

        room.participants.push(session.clone());
        let index = room.participants.len() - 1;
        let Some(color) = Color::from_index(index) else {
            // Only reachable with a capacity above two.
            room.participants.pop();
            return Outcome::fail(RoomError::RoomFull(room_id.clone()));
        };

        if created {
            tracing::info!(%room_id, "room created");
        }
        tracing::info!(
            %room_id,
            %session,
            %color,
            players = room.participants.len(),
            state = %room.state(),
            "participant joined"
        );

        let info = room.info();
        Outcome::ok(Seat { index, color }).broadcast(Recipient::All, &room.participants, info)
    }

    /// Removes `session` from `room_id`. Remaining participants hear
    /// `opponent_left` and then the new head count; an emptied room is
    /// deleted instead.
    pub fn leave(
        &mut self,
        room_id: &RoomId,
        session: &SessionId,
        reason: LeaveReason,
    ) -> Outcome<Departure> {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return Outcome::fail(not_in_room(room_id, session));
        };
        let Some(index) = room.participants.iter().position(|p| p == session) else {
            return Outcome::fail(not_in_room(room_id, session));
        };

        room.participants.remove(index);
        tracing::info!(
            %room_id,
            %session,
            %reason,
            players = room.participants.len(),
            "participant left"
        );

        let mut outcome = Outcome::ok(Departure {
            room_deleted: room.participants.is_empty(),
        });
        outcome.push(
            Recipient::All,
            &room.participants,
            ServerEvent::OpponentLeft {
                room_id: room_id.clone(),
                peer_id: session.clone(),
                reason,
            },
        );

        if room.participants.is_empty() {
            self.rooms.remove(room_id);
            tracing::info!(%room_id, "room deleted");
        } else {
            let info = room.info();
            outcome.push(Recipient::All, &room.participants, info);
        }
        outcome
    }

    /// The room, if `session` sits in it.
    pub fn member_room(&self, room_id: &RoomId, session: &SessionId) -> Result<&Room, RoomError> {
        self.rooms
            .get(room_id)
            .filter(|room| room.contains(session))
            .ok_or_else(|| not_in_room(room_id, session))
    }

    /// Records the variant a room is being played under.
    pub fn set_variant(&mut self, room_id: &RoomId, variant: VariantTag) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            if room.variant != variant {
                tracing::info!(%room_id, from = %room.variant, to = %variant, "room variant changed");
                room.variant = variant;
            }
        }
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

pub(crate) fn not_in_room(room_id: &RoomId, session: &SessionId) -> RoomError {
    RoomError::NotInRoom {
        session: session.clone(),
        room: room_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::from(s)
    }

    fn r1() -> RoomId {
        RoomId::from("R1")
    }

    #[test]
    fn test_join_assigns_colors_by_index() {
        let mut reg = SessionRegistry::new(2);

        let a = reg.join(&r1(), &sid("a")).reply.unwrap();
        let b = reg.join(&r1(), &sid("b")).reply.unwrap();

        assert_eq!(a, Seat { index: 0, color: Color::White });
        assert_eq!(b, Seat { index: 1, color: Color::Black });
        assert_eq!(reg.get(&r1()).unwrap().state(), RoomState::Ready);
    }

    #[test]
    fn test_join_full_room_fails_without_mutation() {
        let mut reg = SessionRegistry::new(2);
        let _ = reg.join(&r1(), &sid("a"));
        let _ = reg.join(&r1(), &sid("b"));

        let outcome = reg.join(&r1(), &sid("c"));

        assert_eq!(outcome.reply, Err(RoomError::RoomFull(r1())));
        assert!(outcome.deliveries.is_empty());
        assert_eq!(reg.get(&r1()).unwrap().participants(), &[sid("a"), sid("b")]);
    }

    #[test]
    fn test_join_broadcasts_player_count_to_all() {
        let mut reg = SessionRegistry::new(2);
        let _ = reg.join(&r1(), &sid("a"));

        let outcome = reg.join(&r1(), &sid("b"));

        let expected = ServerEvent::RoomInfo {
            room_id: r1(),
            player_count: 2,
        };
        assert_eq!(outcome.events_for(&sid("a")), vec![&expected]);
        assert_eq!(outcome.events_for(&sid("b")), vec![&expected]);
    }

    #[test]
    fn test_join_same_room_twice_is_idempotent() {
        let mut reg = SessionRegistry::new(2);
        let _ = reg.join(&r1(), &sid("a"));

        let again = reg.join(&r1(), &sid("a"));

        assert_eq!(again.reply, Ok(Seat { index: 0, color: Color::White }));
        assert!(again.deliveries.is_empty());
        assert_eq!(reg.get(&r1()).unwrap().participants().len(), 1);
    }

    #[test]
    fn test_leave_recomputes_colors() {
        let mut reg = SessionRegistry::new(2);
        let _ = reg.join(&r1(), &sid("a"));
        let _ = reg.join(&r1(), &sid("b"));

        let _ = reg.leave(&r1(), &sid("a"), LeaveReason::Left);

        let room = reg.get(&r1()).unwrap();
        assert_eq!(
            room.seat_of(&sid("b")),
            Some(Seat { index: 0, color: Color::White })
        );
        assert_eq!(room.state(), RoomState::WaitingForOpponent);
    }

    #[test]
    fn test_leave_notifies_remaining_then_counts() {
        let mut reg = SessionRegistry::new(2);
        let _ = reg.join(&r1(), &sid("a"));
        let _ = reg.join(&r1(), &sid("b"));

        let outcome = reg.leave(&r1(), &sid("a"), LeaveReason::Disconnect);

        assert_eq!(outcome.reply, Ok(Departure { room_deleted: false }));
        assert!(outcome.events_for(&sid("a")).is_empty());
        assert_eq!(
            outcome.events_for(&sid("b")),
            vec![
                &ServerEvent::OpponentLeft {
                    room_id: r1(),
                    peer_id: sid("a"),
                    reason: LeaveReason::Disconnect,
                },
                &ServerEvent::RoomInfo {
                    room_id: r1(),
                    player_count: 1,
                },
            ]
        );
    }

    #[test]
    fn test_leave_last_participant_deletes_room() {
        let mut reg = SessionRegistry::new(2);
        let _ = reg.join(&r1(), &sid("a"));

        let outcome = reg.leave(&r1(), &sid("a"), LeaveReason::Left);

        assert_eq!(outcome.reply, Ok(Departure { room_deleted: true }));
        assert!(outcome.deliveries.is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_leave_non_member_returns_not_in_room() {
        let mut reg = SessionRegistry::new(2);
        let _ = reg.join(&r1(), &sid("a"));

        let outcome = reg.leave(&r1(), &sid("x"), LeaveReason::Left);

        assert!(matches!(outcome.reply, Err(RoomError::NotInRoom { .. })));
        assert_eq!(reg.get(&r1()).unwrap().participants().len(), 1);
    }

    #[test]
    fn test_set_variant_is_remembered() {
        let mut reg = SessionRegistry::new(2);
        let _ = reg.join(&r1(), &sid("a"));
        assert_eq!(reg.get(&r1()).unwrap().variant(), VariantTag::Standard);

        reg.set_variant(&r1(), VariantTag::TwoStep);

        assert_eq!(reg.get(&r1()).unwrap().variant(), VariantTag::TwoStep);
    }
}
