//! Typed wrapper around the VideoHive HTTP API.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use hive_shared::models::{Call, Conversation, GameSession, Message, Report, TriviaQuestion, User};
use hive_shared::protocol::{
    ConversationSummary, EndGameRequest, ErrorBody, FriendEntry, FriendPressOutcome,
    IcebreakerResponse, JoinedCall, MatchStatus, MediaEventRequest, MoveAccepted,
    PresenceRequest, ProfileUpdateRequest, RateRequest, RegisterRequest, RegisterResponse,
    ReportRequest, SearchStarted, SearchStopped, SendMessageRequest, StartConversationRequest,
    StartGameRequest, StartSearchRequest, SubmitMoveRequest, UpdateGameStateRequest, UserEvent,
    WaitOutcome,
};
use hive_shared::{GameType, MediaEvent, SearchFilters};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::ClientError;

/// Extra time allowed on top of a long poll's own timeout.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().map(|t| t.is_some()).unwrap_or(false)
    }

    fn bearer(&self) -> Result<String, ClientError> {
        self.token
            .read()
            .ok()
            .and_then(|t| t.clone())
            .ok_or(ClientError::AuthRequired)
    }

    fn builder(&self, method: Method, path: &str, auth: bool) -> Result<reqwest::RequestBuilder, ClientError> {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        if auth {
            Ok(builder.bearer_auth(self.bearer()?))
        } else {
            Ok(builder)
        }
    }

    /// Send and decode a JSON response; `None` for `204 No Content`.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            debug!(status = status.as_u16(), %message, "request rejected");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(Some(response.json().await?))
    }

    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ClientError> {
        self.send(request).await?.ok_or_else(|| ClientError::Api {
            status: StatusCode::NO_CONTENT.as_u16(),
            message: "empty response".into(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.call(self.builder(Method::GET, path, true)?).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.call(self.builder(Method::POST, path, true)?.json(body)).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.call(self.builder(Method::POST, path, true)?).await
    }

    // -- Profiles -----------------------------------------------------------

    /// Register and keep the returned session token for later requests.
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, ClientError> {
        let response: RegisterResponse = self
            .call(self.builder(Method::POST, "/users", false)?.json(request))
            .await?;
        self.set_token(Some(response.session_token.clone()));
        Ok(response)
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        self.get("/users/me").await
    }

    pub async fn update_profile(&self, request: &ProfileUpdateRequest) -> Result<User, ClientError> {
        self.call(self.builder(Method::PATCH, "/users/me", true)?.json(request))
            .await
    }

    pub async fn set_presence(&self, online: bool) -> Result<User, ClientError> {
        self.post("/users/me/presence", &PresenceRequest { online }).await
    }

    pub async fn user(&self, id: Uuid) -> Result<User, ClientError> {
        self.get(&format!("/users/{id}")).await
    }

    // -- Matchmaking --------------------------------------------------------

    pub async fn start_search(&self, filters: &SearchFilters) -> Result<SearchStarted, ClientError> {
        let body = StartSearchRequest {
            filters: filters.clone(),
        };
        self.post("/matchmaking/search", &body).await
    }

    pub async fn stop_search(&self) -> Result<SearchStopped, ClientError> {
        self.call(self.builder(Method::DELETE, "/matchmaking/search", true)?)
            .await
    }

    pub async fn match_status(&self) -> Result<MatchStatus, ClientError> {
        self.get("/matchmaking/status").await
    }

    pub async fn wait_for_match(&self, timeout: Duration) -> Result<WaitOutcome, ClientError> {
        let path = format!("/matchmaking/wait?timeout_secs={}", timeout.as_secs().max(1));
        let request = self
            .builder(Method::GET, &path, true)?
            .timeout(timeout + LONG_POLL_GRACE);
        self.call(request).await
    }

    /// Next pushed event, `None` when the long poll timed out.
    pub async fn next_event(&self, timeout: Duration) -> Result<Option<UserEvent>, ClientError> {
        let path = format!("/events?timeout_secs={}", timeout.as_secs());
        let request = self
            .builder(Method::GET, &path, true)?
            .timeout(timeout + LONG_POLL_GRACE);
        self.send(request).await
    }

    // -- Calls --------------------------------------------------------------

    pub async fn get_call(&self, call_id: Uuid) -> Result<Call, ClientError> {
        self.get(&format!("/calls/{call_id}")).await
    }

    pub async fn join_call(&self, call_id: Uuid) -> Result<JoinedCall, ClientError> {
        self.post_empty(&format!("/calls/{call_id}/join")).await
    }

    pub async fn end_call(&self, call_id: Uuid) -> Result<Call, ClientError> {
        self.post_empty(&format!("/calls/{call_id}/end")).await
    }

    pub async fn press_friend(&self, call_id: Uuid) -> Result<FriendPressOutcome, ClientError> {
        self.post_empty(&format!("/calls/{call_id}/friend")).await
    }

    pub async fn report(&self, call_id: Uuid, request: &ReportRequest) -> Result<Report, ClientError> {
        self.post(&format!("/calls/{call_id}/report"), request).await
    }

    pub async fn rate(&self, call_id: Uuid, rating: u8) -> Result<Call, ClientError> {
        self.post(&format!("/calls/{call_id}/rate"), &RateRequest { rating })
            .await
    }

    pub async fn media_event(&self, call_id: Uuid, event: MediaEvent) -> Result<Call, ClientError> {
        self.post(&format!("/calls/{call_id}/media-events"), &MediaEventRequest { event })
            .await
    }

    pub async fn icebreaker(&self, call_id: Uuid, seed: Option<&str>) -> Result<String, ClientError> {
        let mut request = self.builder(Method::GET, &format!("/calls/{call_id}/icebreaker"), true)?;
        if let Some(seed) = seed {
            request = request.query(&[("seed", seed)]);
        }
        let response: IcebreakerResponse = self.call(request).await?;
        Ok(response.prompt)
    }

    // -- Social -------------------------------------------------------------

    pub async fn friends(&self) -> Result<Vec<FriendEntry>, ClientError> {
        self.get("/friends").await
    }

    pub async fn start_conversation(&self, friend_id: Uuid) -> Result<Conversation, ClientError> {
        self.post("/conversations", &StartConversationRequest { friend_id })
            .await
    }

    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        self.get("/conversations").await
    }

    pub async fn messages(&self, conversation_id: Uuid, limit: u32, offset: u32) -> Result<Vec<Message>, ClientError> {
        self.get(&format!(
            "/conversations/{conversation_id}/messages?limit={limit}&offset={offset}"
        ))
        .await
    }

    pub async fn send_message(&self, conversation_id: Uuid, content: &str) -> Result<Message, ClientError> {
        let body = SendMessageRequest {
            content: content.to_string(),
        };
        self.post(&format!("/conversations/{conversation_id}/messages"), &body)
            .await
    }

    pub async fn mark_read(&self, conversation_id: Uuid) -> Result<u64, ClientError> {
        let body: serde_json::Value = self
            .post_empty(&format!("/conversations/{conversation_id}/read"))
            .await?;
        Ok(body["marked"].as_u64().unwrap_or(0))
    }

    // -- Mini-games ---------------------------------------------------------

    pub async fn start_game(&self, call_id: Uuid, game_type: GameType) -> Result<GameSession, ClientError> {
        self.post(&format!("/calls/{call_id}/games"), &StartGameRequest { game_type })
            .await
    }

    pub async fn get_game(&self, session_id: Uuid) -> Result<GameSession, ClientError> {
        self.get(&format!("/games/{session_id}")).await
    }

    pub async fn update_game_state(
        &self,
        session_id: Uuid,
        state: serde_json::Value,
        expected_version: Option<i64>,
    ) -> Result<GameSession, ClientError> {
        let body = UpdateGameStateRequest {
            state,
            expected_version,
        };
        self.call(
            self.builder(Method::PUT, &format!("/games/{session_id}/state"), true)?
                .json(&body),
        )
        .await
    }

    pub async fn submit_move(&self, session_id: Uuid, choice: &str) -> Result<MoveAccepted, ClientError> {
        let body = SubmitMoveRequest {
            choice: choice.to_string(),
        };
        self.post(&format!("/games/{session_id}/moves"), &body).await
    }

    pub async fn end_game(&self, session_id: Uuid, result: serde_json::Value) -> Result<GameSession, ClientError> {
        self.post(&format!("/games/{session_id}/end"), &EndGameRequest { result })
            .await
    }

    pub async fn trivia(&self, limit: u32) -> Result<Vec<TriviaQuestion>, ClientError> {
        self.get(&format!("/trivia?limit={limit}")).await
    }
}
