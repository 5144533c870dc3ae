//! Peer-side game driver.
//!
//! [`PeerGame`] is what a participant runs next to its connection: it
//! owns the local [`RuleEngine`] (through a [`SyncAdapter`]), turns local
//! intent into [`ClientEvent`] requests, and folds the session server's
//! broadcasts back into the engine.

use gambit_protocol::{
    ClientEvent, Color, MovePayload, OfferId, OfferKind, RoomId, ServerEvent, VariantTag,
};
use gambit_rules::{AppliedMove, RuleEngine, RuleError, SyncAdapter, SyncOutcome, TerminalReason};

use crate::GambitError;

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEnd {
    /// The board itself is over (mate, stalemate, dead position, repetition).
    Terminal(TerminalReason),
    DrawAgreed,
    Resigned(Color),
}

/// What [`PeerGame::handle_event`] did with a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerUpdate {
    /// A relayed move was folded into the local engine.
    Synced(SyncOutcome),
    /// An accepted undo rolled the engine back.
    Undone { plies: u8 },
    /// A fresh game started.
    Reset,
    GameOver(GameEnd),
    /// Membership and offer traffic: nothing for the engine to do.
    Ignored,
}

/// One participant's view of the game in one room.
#[derive(Debug, Clone)]
pub struct PeerGame {
    room_id: RoomId,
    color: Option<Color>,
    sync: SyncAdapter,
    ended: Option<GameEnd>,
}

impl PeerGame {
    pub fn new(room_id: RoomId, tag: VariantTag) -> Self {
        Self {
            room_id,
            color: None,
            sync: SyncAdapter::new(RuleEngine::new(tag)),
            ended: None,
        }
    }

    /// Records the colour from the `join_room` reply.
    pub fn seat(&mut self, color: Color) {
        self.color = Some(color);
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn engine(&self) -> &RuleEngine {
        self.sync.engine()
    }

    /// `Some` once the game is over by board, agreement or resignation.
    pub fn ended(&self) -> Option<GameEnd> {
        self.ended.or_else(|| {
            let reason = self.engine().terminal_reason();
            reason.is_terminal().then_some(GameEnd::Terminal(reason))
        })
    }

    pub fn join(&self) -> ClientEvent {
        ClientEvent::JoinRoom {
            room_id: self.room_id.clone(),
        }
    }

    /// Plays a move locally and returns the `make_move` request that
    /// relays it. The engine is untouched if the move is refused.
    pub fn play(&mut self, uci: &str) -> Result<(AppliedMove, ClientEvent), GambitError> {
        if self.ended.is_some() {
            return Err(RuleError::IllegalMove {
                from: uci.to_string(),
                to: String::new(),
            }
            .into());
        }
        let applied = self.sync.engine_mut().apply_uci(uci)?;
        let request = ClientEvent::MakeMove(MovePayload {
            room_id: self.room_id.clone(),
            mv: applied.record.clone(),
            position: applied.position.clone(),
            variant_tag: self.engine().tag(),
            variant_state: Some(applied.variant_state),
        });
        Ok((applied, request))
    }

    /// Proposes taking back this side's last turn, sized by the variant.
    ///
    /// Fails with `NO_HISTORY` when there is nothing to take back.
    pub fn propose_undo(&self) -> Result<ClientEvent, GambitError> {
        let engine = self.engine();
        // Unseated peers propose for whoever moved last.
        let color = self.color.unwrap_or_else(|| engine.side_to_move().opponent());
        let plies = engine.suggested_undo_plies(color);
        if !engine.can_undo(plies) {
            return Err(RuleError::NoHistory {
                requested: plies,
                available: engine.history_len(),
            }
            .into());
        }
        Ok(ClientEvent::OfferAction {
            room_id: self.room_id.clone(),
            kind: OfferKind::Undo.to_string(),
            from_color: Some(color),
            plies: Some(i64::try_from(plies).unwrap_or(i64::MAX)),
            base_fingerprint: Some(engine.current_position()),
        })
    }

    pub fn propose_draw(&self) -> ClientEvent {
        ClientEvent::OfferAction {
            room_id: self.room_id.clone(),
            kind: OfferKind::Draw.to_string(),
            from_color: self.color,
            plies: None,
            base_fingerprint: None,
        }
    }

    /// Answers an `offer_received`, vouching for the position on screen.
    pub fn respond(&self, offer_id: OfferId, accept: bool) -> ClientEvent {
        ClientEvent::RespondOffer {
            room_id: self.room_id.clone(),
            offer_id,
            accept,
            current_fingerprint: Some(self.engine().current_position()),
        }
    }

    pub fn resign(&self) -> Result<ClientEvent, GambitError> {
        let color = self.color.ok_or_else(|| {
            gambit_room::RoomError::BadRequest("resign before being seated".to_string())
        })?;
        Ok(ClientEvent::ResignGame {
            room_id: self.room_id.clone(),
            color,
        })
    }

    pub fn reset(&self) -> ClientEvent {
        ClientEvent::ResetGame {
            room_id: self.room_id.clone(),
        }
    }

    /// Applies one broadcast to the local game.
    ///
    /// An undo the local history cannot satisfy fails with `NO_HISTORY`;
    /// the caller should then [`force_resync`](Self::force_resync).
    pub fn handle_event(&mut self, event: &ServerEvent) -> Result<PeerUpdate, GambitError> {
        match event {
            ServerEvent::MoveMade(payload) => {
                let outcome = self.sync.apply_remote_move(
                    &payload.position,
                    payload.variant_tag,
                    payload.variant_state,
                )?;
                Ok(PeerUpdate::Synced(outcome))
            }
            ServerEvent::UndoCommitted { plies, .. } => {
                self.sync.engine_mut().undo(usize::from(*plies))?;
                self.ended = None;
                Ok(PeerUpdate::Undone { plies: *plies })
            }
            ServerEvent::GameReset { .. } => {
                let tag = self.engine().tag();
                self.sync = SyncAdapter::new(RuleEngine::new(tag));
                self.ended = None;
                Ok(PeerUpdate::Reset)
            }
            ServerEvent::DrawCommitted { .. } => Ok(self.finish(GameEnd::DrawAgreed)),
            ServerEvent::PlayerResigned { color, .. } => Ok(self.finish(GameEnd::Resigned(*color))),
            ServerEvent::RoomInfo { .. }
            | ServerEvent::OpponentLeft { .. }
            | ServerEvent::OfferReceived { .. }
            | ServerEvent::OfferResult { .. } => Ok(PeerUpdate::Ignored),
        }
    }

    /// Reloads the local engine at the peer's position, dropping history.
    pub fn force_resync(&mut self, payload: &MovePayload) -> Result<(), GambitError> {
        if payload.variant_tag != self.engine().tag() {
            self.sync.apply_remote_move(&payload.position, payload.variant_tag, payload.variant_state)?;
        } else {
            self.sync
                .force_resync(&payload.position, payload.variant_state.unwrap_or_default())?;
        }
        Ok(())
    }

    fn finish(&mut self, end: GameEnd) -> PeerUpdate {
        tracing::info!(room_id = %self.room_id, ?end, "game over");
        self.ended = Some(end);
        PeerUpdate::GameOver(end)
    }
}
