//! The mini-game running inside the current call.

use std::sync::Arc;

use hive_shared::games::{EmojiGuessState, RpsChoice, RpsState};
use hive_shared::models::{GameSession, TriviaQuestion};
use hive_shared::protocol::{MoveAccepted, UserEvent};
use hive_shared::GameType;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::error::ClientError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameState {
    pub session: Option<GameSession>,
    pub trivia_pool: Vec<TriviaQuestion>,
}

impl GameState {
    pub fn game_type(&self) -> Option<GameType> {
        self.session.as_ref().map(|s| s.game_type)
    }

    pub fn state_blob(&self) -> Option<&serde_json::Value> {
        self.session.as_ref().map(|s| &s.game_state)
    }

    fn typed<T: serde::de::DeserializeOwned>(&self, game_type: GameType) -> Option<T> {
        let session = self.session.as_ref().filter(|s| s.game_type == game_type)?;
        serde_json::from_value(session.game_state.clone()).ok()
    }

    pub fn rps(&self) -> Option<RpsState> {
        self.typed(GameType::RockPaperScissors)
    }

    pub fn emoji_guess(&self) -> Option<EmojiGuessState> {
        self.typed(GameType::EmojiGuess)
    }
}

#[derive(Clone)]
pub struct GameStore {
    api: ApiClient,
    state: Arc<RwLock<GameState>>,
}

impl GameStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Arc::new(RwLock::new(GameState::default())),
        }
    }

    pub async fn snapshot(&self) -> GameState {
        self.state.read().await.clone()
    }

    async fn require_session(&self) -> Result<GameSession, ClientError> {
        self.state
            .read()
            .await
            .session
            .clone()
            .ok_or(ClientError::NoActiveGame)
    }

    async fn store_session(&self, session: GameSession) {
        let mut state = self.state.write().await;
        state.session = if session.is_active() { Some(session) } else { None };
    }

    pub async fn start(&self, call_id: Uuid, game_type: GameType) -> Result<GameSession, ClientError> {
        let session = self.api.start_game(call_id, game_type).await?;
        debug!(session_id = %session.id, game = game_type.as_str(), "game started");
        self.store_session(session.clone()).await;
        Ok(session)
    }

    /// Replace the state blob, guarded by the version last seen. On a
    /// version conflict the session is re-read so the caller can retry.
    pub async fn update_state(&self, new_state: serde_json::Value) -> Result<GameSession, ClientError> {
        let current = self.require_session().await?;
        match self
            .api
            .update_game_state(current.id, new_state, Some(current.version))
            .await
        {
            Ok(session) => {
                self.store_session(session.clone()).await;
                Ok(session)
            }
            Err(e) if e.is_status(409) => {
                warn!(session_id = %current.id, "game state changed underneath us");
                if let Ok(latest) = self.api.get_game(current.id).await {
                    self.store_session(latest).await;
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Seal a rock-paper-scissors move. The opponent's choice only shows
    /// up once the round resolved.
    pub async fn submit_move(&self, choice: RpsChoice) -> Result<MoveAccepted, ClientError> {
        let current = self.require_session().await?;
        if current.game_type != GameType::RockPaperScissors {
            return Err(ClientError::GameState(format!(
                "moves are only sealed for rock-paper-scissors, not {}",
                current.game_type.as_str()
            )));
        }
        let accepted = self.api.submit_move(current.id, choice.as_str()).await?;
        self.store_session(accepted.session.clone()).await;
        Ok(accepted)
    }

    /// Submit a guess for the emoji round and persist the result.
    pub async fn guess_emoji(&self, guess: &str) -> Result<bool, ClientError> {
        let mut round = self
            .state
            .read()
            .await
            .emoji_guess()
            .ok_or(ClientError::NoActiveGame)?;
        let correct = round.guess(guess);
        let blob = serde_json::to_value(&round).map_err(|e| ClientError::GameState(e.to_string()))?;
        self.update_state(blob).await?;
        Ok(correct)
    }

    pub async fn end(&self, result: serde_json::Value) -> Result<GameSession, ClientError> {
        let current = self.require_session().await?;
        let session = self.api.end_game(current.id, result).await?;
        self.state.write().await.session = None;
        Ok(session)
    }

    pub async fn load_trivia(&self, limit: u32) -> Result<Vec<TriviaQuestion>, ClientError> {
        let questions = self.api.trivia(limit).await?;
        self.state.write().await.trivia_pool = questions.clone();
        Ok(questions)
    }

    /// Take a pushed session update. A session started by the counterpart
    /// is adopted when none is held; stale versions are dropped.
    pub async fn apply_event(&self, event: &UserEvent) {
        let UserEvent::GameUpdated { session } = event else {
            return;
        };
        let mut state = self.state.write().await;
        let newer = match &state.session {
            Some(held) => held.id == session.id && session.version >= held.version,
            None => session.is_active(),
        };
        if newer {
            state.session = session.is_active().then(|| session.clone());
        }
    }

    /// Drop the session, e.g. when the call it belongs to ended.
    pub async fn clear(&self) {
        self.state.write().await.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hive_shared::games::initial_state;

    fn session(game_type: GameType, version: i64) -> GameSession {
        let now = Utc::now();
        GameSession {
            id: Uuid::new_v4(),
            call_id: Uuid::new_v4(),
            game_type,
            game_state: initial_state(game_type),
            game_result: None,
            version,
            started_at: now,
            ended_at: None,
            created_at: now,
        }
    }

    fn store() -> GameStore {
        GameStore::new(ApiClient::new("http://127.0.0.1:9"))
    }

    #[tokio::test]
    async fn test_adopts_counterpart_session_and_ignores_stale() {
        let store = store();
        let s = session(GameType::RockPaperScissors, 2);
        store.apply_event(&UserEvent::GameUpdated { session: s.clone() }).await;
        assert_eq!(store.snapshot().await.session, Some(s.clone()));
        assert_eq!(store.snapshot().await.rps(), Some(RpsState::default()));

        let stale = GameSession {
            version: 1,
            game_state: serde_json::json!({}),
            ..s.clone()
        };
        store.apply_event(&UserEvent::GameUpdated { session: stale }).await;
        assert_eq!(store.snapshot().await.session, Some(s.clone()));

        let ended = GameSession {
            version: 3,
            ended_at: Some(Utc::now()),
            ..s
        };
        store.apply_event(&UserEvent::GameUpdated { session: ended }).await;
        assert!(store.snapshot().await.session.is_none());
    }

    #[tokio::test]
    async fn test_moves_require_rps_session() {
        let store = store();
        assert!(matches!(
            store.submit_move(RpsChoice::Rock).await,
            Err(ClientError::NoActiveGame)
        ));

        store
            .apply_event(&UserEvent::GameUpdated {
                session: session(GameType::Trivia, 1),
            })
            .await;
        assert!(matches!(
            store.submit_move(RpsChoice::Rock).await,
            Err(ClientError::GameState(_))
        ));
        assert!(store.snapshot().await.emoji_guess().is_none());
    }
}
