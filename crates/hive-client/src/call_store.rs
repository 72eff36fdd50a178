//! In-memory view of the active call.
//!
//! State only changes after the server accepted the corresponding request,
//! or when a pushed [`UserEvent`] reports a newer version of the call.

use std::sync::Arc;

use hive_shared::models::{Call, Friendship, User};
use hive_shared::protocol::{FriendPressOutcome, JoinedCall, ReportRequest, UserEvent};
use hive_shared::validation::{validate_rating, validate_report_description};
use hive_shared::{CallRole, MediaEvent, ReportReason};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::error::ClientError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallState {
    pub current_call: Option<Call>,
    pub my_role: Option<CallRole>,
    pub connected_user: Option<User>,
    pub channel_name: Option<String>,
    pub media_token: Option<String>,
    pub media_app_id: Option<String>,
    pub friend_pressed: bool,
    pub other_friend_pressed: bool,
    pub friendship: Option<Friendship>,
    pub current_icebreaker: Option<String>,
}

impl CallState {
    fn from_joined(joined: JoinedCall) -> Self {
        let my_role = joined.call.role_of(joined.counterpart.id).map(|r| r.other());
        Self {
            my_role,
            connected_user: Some(joined.counterpart),
            channel_name: Some(joined.channel_name),
            media_token: Some(joined.media_token),
            media_app_id: Some(joined.media_app_id),
            friend_pressed: joined.friend_pressed,
            other_friend_pressed: joined.other_friend_pressed,
            friendship: None,
            current_icebreaker: Some(joined.icebreaker),
            current_call: Some(joined.call),
        }
    }

    /// Take a newer server copy of the current call.
    fn refresh_call(&mut self, call: Call) {
        if let Some(role) = self.my_role {
            self.friend_pressed = call.friend_pressed(role);
            self.other_friend_pressed = call.friend_pressed(role.other());
        }
        self.current_call = Some(call);
    }

    fn call_id(&self) -> Option<Uuid> {
        self.current_call.as_ref().map(|c| c.id)
    }

    fn pressed_outcome(&self) -> Option<FriendPressOutcome> {
        let call = self.current_call.clone().filter(|_| self.friend_pressed)?;
        Some(FriendPressOutcome {
            call,
            already_pressed: true,
            friendship: self.friendship.clone(),
        })
    }
}

#[derive(Clone)]
pub struct CallStore {
    api: ApiClient,
    state: Arc<RwLock<CallState>>,
}

impl CallStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Arc::new(RwLock::new(CallState::default())),
        }
    }

    pub async fn snapshot(&self) -> CallState {
        self.state.read().await.clone()
    }

    pub async fn current_call_id(&self) -> Option<Uuid> {
        self.state.read().await.call_id()
    }

    pub async fn in_call(&self) -> bool {
        self.state.read().await.current_call.is_some()
    }

    async fn require_call(&self) -> Result<Uuid, ClientError> {
        self.current_call_id().await.ok_or(ClientError::NoActiveCall)
    }

    /// Join `call_id` and make it the current call.
    pub async fn join(&self, call_id: Uuid) -> Result<JoinedCall, ClientError> {
        let joined = self.api.join_call(call_id).await?;
        self.adopt_joined(joined.clone()).await;
        Ok(joined)
    }

    pub(crate) async fn adopt_joined(&self, joined: JoinedCall) {
        info!(call_id = %joined.call.id, channel = %joined.channel_name, "joined call");
        *self.state.write().await = CallState::from_joined(joined);
    }

    /// End a call that was joined on behalf of a search nobody wants anymore.
    pub(crate) async fn abandon(&self, call_id: Uuid) -> Result<(), ClientError> {
        self.api.end_call(call_id).await?;
        self.reset_if_current(call_id).await;
        Ok(())
    }

    /// Hang up. Idempotent: with no current call this is a no-op returning
    /// `None`, and the local state is cleared even if the counterpart
    /// already ended the call.
    pub async fn end(&self) -> Result<Option<Call>, ClientError> {
        let Some(call_id) = self.current_call_id().await else {
            return Ok(None);
        };
        match self.api.end_call(call_id).await {
            Ok(call) => {
                self.reset_if_current(call_id).await;
                Ok(Some(call))
            }
            Err(e) if e.is_status(404) => {
                self.reset_if_current(call_id).await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Press "friend" once per call; repeat presses answer from local state.
    pub async fn press_friend(&self) -> Result<FriendPressOutcome, ClientError> {
        if let Some(cached) = self.state.read().await.pressed_outcome() {
            return Ok(cached);
        }
        let call_id = self.require_call().await?;
        let outcome = self.api.press_friend(call_id).await?;

        let mut state = self.state.write().await;
        if state.call_id() == Some(call_id) {
            state.refresh_call(outcome.call.clone());
            if outcome.friendship.is_some() {
                state.friendship = outcome.friendship.clone();
            }
        }
        Ok(outcome)
    }

    /// Report the counterpart; this also ends the call.
    pub async fn report(
        &self,
        reason: ReportReason,
        description: Option<String>,
    ) -> Result<(), ClientError> {
        validate_report_description(description.as_deref())?;
        let call_id = self.require_call().await?;
        self.api
            .report(call_id, &ReportRequest { reason, description })
            .await?;
        self.reset_if_current(call_id).await;
        Ok(())
    }

    /// Rate the counterpart of `call_id`. Usually called after the call ended,
    /// so it does not rely on the current call.
    pub async fn rate(&self, call_id: Uuid, rating: u8) -> Result<Call, ClientError> {
        validate_rating(rating)?;
        self.api.rate(call_id, rating).await
    }

    /// Forward a transport callback for the current call.
    pub async fn media_event(&self, event: MediaEvent) -> Result<Call, ClientError> {
        let call_id = self.require_call().await?;
        let call = self.api.media_event(call_id, event).await?;
        self.apply_call(call.clone()).await;
        Ok(call)
    }

    pub async fn next_icebreaker(&self) -> Result<String, ClientError> {
        let call_id = self.require_call().await?;
        let prompt = self.api.icebreaker(call_id, None).await?;

        let mut state = self.state.write().await;
        if state.call_id() == Some(call_id) {
            state.current_icebreaker = Some(prompt.clone());
        }
        Ok(prompt)
    }

    /// Fold a pushed event into the state. Events for other calls are ignored.
    pub async fn apply_event(&self, event: &UserEvent) {
        match event {
            UserEvent::CallUpdated { call } => self.apply_call(call.clone()).await,
            UserEvent::CallCanceled { call_id } => self.reset_if_current(*call_id).await,
            UserEvent::FriendshipFormed { friendship } => {
                let mut state = self.state.write().await;
                if friendship.call_id.is_some() && friendship.call_id == state.call_id() {
                    state.friend_pressed = true;
                    state.other_friend_pressed = true;
                    state.friendship = Some(friendship.clone());
                }
            }
            _ => {}
        }
    }

    async fn apply_call(&self, call: Call) {
        let mut state = self.state.write().await;
        if state.call_id() != Some(call.id) {
            return;
        }
        if call.status.is_terminal() {
            debug!(call_id = %call.id, status = call.status.as_str(), "call finished");
            *state = CallState::default();
        } else {
            state.refresh_call(call);
        }
    }

    async fn reset_if_current(&self, call_id: Uuid) {
        let mut state = self.state.write().await;
        if state.call_id() == Some(call_id) {
            *state = CallState::default();
        }
    }

    pub async fn reset(&self) {
        *self.state.write().await = CallState::default();
    }

    #[cfg(test)]
    async fn adopt(&self, state: CallState) {
        *self.state.write().await = state;
    }
}
