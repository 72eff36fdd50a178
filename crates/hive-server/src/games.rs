//! Mini-game sessions inside a call.
//!
//! The server is the only writer of the authoritative state. Free-form
//! games replace the blob wholesale (optionally compare-and-swap on the
//! version); rock-paper-scissors goes through sealed moves instead.

use chrono::Utc;
use hive_shared::games::{initial_state, random_emoji_puzzle, EmojiGuessState, PlayerSlot, RpsChoice};
use hive_shared::models::{Call, GameSession};
use hive_shared::protocol::{MoveAccepted, UserEvent};
use hive_shared::GameType;
use hive_store::{Database, StoreError};
use tracing::info;
use uuid::Uuid;

use crate::db::Db;
use crate::error::ServerError;
use crate::events::EventHub;

#[derive(Clone)]
pub struct GameCoordinator {
    db: Db,
    events: EventHub,
}

impl GameCoordinator {
    pub fn new(db: Db, events: EventHub) -> Self {
        Self { db, events }
    }

    /// Open a session of `game_type` on a call that is under way. The
    /// starting player hosts an emoji-guess round.
    pub async fn start(
        &self,
        user_id: Uuid,
        call_id: Uuid,
        game_type: GameType,
    ) -> Result<GameSession, ServerError> {
        let (call, session) = self
            .db
            .call(move |db| {
                let call = db.get_call(call_id)?;
                let counterpart = call.counterpart_of(user_id).ok_or(StoreError::NotParticipant)?;
                if !call.status.has_started() || call.status.is_terminal() {
                    return Err(ServerError::Conflict(format!(
                        "cannot start a game on a {} call",
                        call.status
                    )));
                }

                let state = match game_type {
                    GameType::EmojiGuess => {
                        let now_ms = Utc::now().timestamp_millis();
                        let round = EmojiGuessState::with_puzzle(
                            random_emoji_puzzle(),
                            user_id,
                            counterpart,
                            now_ms,
                        );
                        serde_json::to_value(round)
                            .map_err(|e| ServerError::Internal(e.to_string()))?
                    }
                    other => initial_state(other),
                };

                let session = db.create_game_session(call_id, game_type, &state, Utc::now())?;
                Ok((call, session))
            })
            .await?;

        info!(
            session_id = %session.id,
            call_id = %call.id,
            game_type = %session.game_type,
            "game started"
        );
        self.broadcast(&call, &session).await;
        Ok(session)
    }

    pub async fn get(&self, user_id: Uuid, session_id: Uuid) -> Result<GameSession, ServerError> {
        let (_, session) = self
            .db
            .call(move |db| authorized(db, user_id, session_id))
            .await?;
        Ok(session)
    }

    pub async fn update_state(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        state: serde_json::Value,
        expected_version: Option<i64>,
    ) -> Result<GameSession, ServerError> {
        let (call, session) = self
            .db
            .call(move |db| {
                let (call, _) = authorized(db, user_id, session_id)?;
                let session = db.replace_game_state(session_id, &state, expected_version)?;
                Ok((call, session))
            })
            .await?;

        self.broadcast(&call, &session).await;
        Ok(session)
    }

    /// Seal a rock-paper-scissors move for the caller's slot.
    pub async fn submit_move(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        choice: &str,
    ) -> Result<MoveAccepted, ServerError> {
        let choice = RpsChoice::parse(choice).map_err(StoreError::from)?;

        let (call, outcome) = self
            .db
            .call(move |db| {
                let (call, _) = authorized(db, user_id, session_id)?;
                let role = call.role_of(user_id).ok_or(StoreError::NotParticipant)?;
                let outcome =
                    db.submit_rps_move(session_id, PlayerSlot::from_role(role), choice, Utc::now())?;
                Ok((call, outcome))
            })
            .await?;

        if outcome.resolved.is_some() {
            self.broadcast(&call, &outcome.session).await;
        }

        Ok(MoveAccepted {
            session: outcome.session,
            round: outcome.round,
            resolved: outcome.resolved,
        })
    }

    pub async fn end(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        result: serde_json::Value,
    ) -> Result<GameSession, ServerError> {
        let (call, session, changed) = self
            .db
            .call(move |db| {
                let (call, _) = authorized(db, user_id, session_id)?;
                let (session, changed) = db.end_game_session(session_id, &result, Utc::now())?;
                Ok((call, session, changed))
            })
            .await?;

        if changed {
            info!(session_id = %session.id, "game ended");
            self.broadcast(&call, &session).await;
        }
        Ok(session)
    }

    async fn broadcast(&self, call: &Call, session: &GameSession) {
        for participant in [call.caller_id, call.callee_id] {
            self.events
                .publish(
                    participant,
                    UserEvent::GameUpdated {
                        session: session.clone(),
                    },
                )
                .await;
        }
    }
}

/// Load a session and its call, checking that `user_id` plays in it.
fn authorized(
    db: &Database,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<(Call, GameSession), ServerError> {
    let session = db.get_game_session(session_id)?;
    let call = db.get_call(session.call_id)?;
    if call.role_of(user_id).is_none() {
        return Err(StoreError::NotParticipant.into());
    }
    Ok((call, session))
}
