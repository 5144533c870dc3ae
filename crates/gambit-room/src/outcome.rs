//! The result of one room operation: a direct reply plus broadcasts.

use gambit_protocol::{Recipient, ServerEvent, SessionId};

use crate::RoomError;

/// One event addressed to one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: SessionId,
    pub event: ServerEvent,
}

/// What an operation answers the caller, and what it pushes to others.
///
/// The two are kept apart: a failed call can still broadcast (a stale
/// undo tells the whole room it was dropped), and a successful one may
/// broadcast nothing.
#[derive(Debug)]
#[must_use]
pub struct Outcome<T> {
    pub reply: Result<T, RoomError>,
    pub deliveries: Vec<Delivery>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            reply: Ok(value),
            deliveries: Vec::new(),
        }
    }

    pub fn fail(error: RoomError) -> Self {
        Self {
            reply: Err(error),
            deliveries: Vec::new(),
        }
    }

    /// Queues `event` for every participant `recipient` resolves to.
    /// Resolution happens now, against the membership passed in.
    pub fn broadcast(
        mut self,
        recipient: Recipient,
        participants: &[SessionId],
        event: ServerEvent,
    ) -> Self {
        self.push(recipient, participants, event);
        self
    }

    pub(crate) fn push(&mut self, recipient: Recipient, participants: &[SessionId], event: ServerEvent) {
        self.deliveries.extend(
            recipient
                .resolve(participants)
                .into_iter()
                .map(|to| Delivery {
                    to,
                    event: event.clone(),
                }),
        );
    }

    /// Moves `other`'s deliveries in front of anything queued later and
    /// hands back its reply.
    pub fn absorb<U>(&mut self, other: Outcome<U>) -> Result<U, RoomError> {
        self.deliveries.extend(other.deliveries);
        other.reply
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            reply: self.reply.map(f),
            deliveries: self.deliveries,
        }
    }

    /// Replaces the reply, keeping the deliveries.
    pub fn with_reply<U>(self, reply: Result<U, RoomError>) -> Outcome<U> {
        Outcome {
            reply,
            deliveries: self.deliveries,
        }
    }

    /// Events queued for `session`, in order.
    pub fn events_for(&self, session: &SessionId) -> Vec<&ServerEvent> {
        self.deliveries
            .iter()
            .filter(|d| &d.to == session)
            .map(|d| &d.event)
            .collect()
    }
}

impl<T> From<RoomError> for Outcome<T> {
    fn from(error: RoomError) -> Self {
        Self::fail(error)
    }
}
