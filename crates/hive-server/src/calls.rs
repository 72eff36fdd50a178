//! Call lifecycle: join, end, friend press, report, rate, transport
//! callbacks. Every state change is pushed to the counterpart as a
//! `call_updated` event.

use chrono::Utc;
use hive_shared::models::{Call, Report};
use hive_shared::protocol::{FriendPressOutcome, JoinedCall, ReportRequest, UserEvent};
use hive_shared::validation::{validate_rating, validate_report_description};
use hive_shared::{CallStatus, MediaEvent};
use tracing::info;
use uuid::Uuid;

use crate::db::Db;
use crate::error::ServerError;
use crate::events::EventHub;
use crate::icebreaker::IcebreakerService;
use crate::media::MediaTokenIssuer;

#[derive(Clone)]
pub struct CallManager {
    db: Db,
    events: EventHub,
    media: MediaTokenIssuer,
    icebreakers: IcebreakerService,
    require_both_joined: bool,
}

impl CallManager {
    pub fn new(
        db: Db,
        events: EventHub,
        media: MediaTokenIssuer,
        icebreakers: IcebreakerService,
        require_both_joined: bool,
    ) -> Self {
        Self {
            db,
            events,
            media,
            icebreakers,
            require_both_joined,
        }
    }

    /// Read a call. Only its two participants may see it.
    pub async fn get(&self, user_id: Uuid, call_id: Uuid) -> Result<Call, ServerError> {
        let call = self.db.call(move |db| Ok(db.get_call(call_id)?)).await?;
        if call.role_of(user_id).is_none() {
            return Err(ServerError::Forbidden("not a participant of this call".into()));
        }
        Ok(call)
    }

    pub async fn join(&self, user_id: Uuid, call_id: Uuid) -> Result<JoinedCall, ServerError> {
        let require_both = self.require_both_joined;
        let (call, me, counterpart) = self
            .db
            .call(move |db| {
                let call = db.join_call(call_id, user_id, require_both)?;
                let counterpart_id = call
                    .counterpart_of(user_id)
                    .ok_or(hive_store::StoreError::NotParticipant)?;
                let me = db.get_user(user_id)?;
                let counterpart = db.get_user(counterpart_id)?;
                Ok((call, me, counterpart))
            })
            .await?;

        let role = call
            .role_of(user_id)
            .ok_or_else(|| ServerError::Forbidden("not a participant of this call".into()))?;
        let media_token = self.media.issue(&call.channel_name, user_id, Utc::now())?;
        let icebreaker = self
            .icebreakers
            .generate(&me.interests, &counterpart.interests, &call.channel_name)
            .await;

        info!(call_id = %call.id, user_id = %user_id, status = %call.status, "joined call");
        self.notify_counterpart(&call, user_id).await;

        Ok(JoinedCall {
            channel_name: call.channel_name.clone(),
            media_app_id: self.media.app_id().to_string(),
            media_token,
            friend_pressed: call.friend_pressed(role),
            other_friend_pressed: call.friend_pressed(role.other()),
            icebreaker,
            counterpart,
            call,
        })
    }

    /// Idempotent; ending an already finished call returns it unchanged.
    pub async fn end(&self, user_id: Uuid, call_id: Uuid) -> Result<Call, ServerError> {
        self.finish(user_id, call_id, CallStatus::Ended).await
    }

    pub async fn press_friend(
        &self,
        user_id: Uuid,
        call_id: Uuid,
    ) -> Result<FriendPressOutcome, ServerError> {
        let press = self
            .db
            .call(move |db| Ok(db.press_friend(call_id, user_id, Utc::now())?))
            .await?;

        if !press.already_pressed {
            self.notify_counterpart(&press.call, user_id).await;
        }
        if press.formed {
            if let Some(friendship) = &press.friendship {
                for participant in [press.call.caller_id, press.call.callee_id] {
                    self.events
                        .publish(
                            participant,
                            UserEvent::FriendshipFormed {
                                friendship: friendship.clone(),
                            },
                        )
                        .await;
                }
            }
        }

        Ok(FriendPressOutcome {
            call: press.call,
            already_pressed: press.already_pressed,
            friendship: press.friendship,
        })
    }

    /// File a report against the counterpart and end the call as `reported`.
    pub async fn report(
        &self,
        user_id: Uuid,
        call_id: Uuid,
        request: ReportRequest,
    ) -> Result<Report, ServerError> {
        validate_report_description(request.description.as_deref())?;

        let (call, changed, report) = self
            .db
            .call(move |db| {
                Ok(db.report_call(
                    call_id,
                    user_id,
                    request.reason,
                    request.description.as_deref(),
                    Utc::now(),
                )?)
            })
            .await?;

        if changed {
            self.notify_counterpart(&call, user_id).await;
        }
        Ok(report)
    }

    pub async fn rate(&self, user_id: Uuid, call_id: Uuid, rating: u8) -> Result<Call, ServerError> {
        validate_rating(rating)?;
        self.db
            .call(move |db| Ok(db.rate_call(call_id, user_id, rating)?))
            .await
    }

    /// Callbacks raised by the user's video transport.
    pub async fn media_event(
        &self,
        user_id: Uuid,
        call_id: Uuid,
        event: MediaEvent,
    ) -> Result<Call, ServerError> {
        match event {
            MediaEvent::PeerJoined => {
                let call = self
                    .db
                    .call(move |db| Ok(db.acknowledge_peer(call_id, user_id)?))
                    .await?;
                self.notify_counterpart(&call, user_id).await;
                Ok(call)
            }
            MediaEvent::PeerLeft | MediaEvent::Error => {
                if event == MediaEvent::Error {
                    tracing::warn!(call_id = %call_id, user_id = %user_id, "media transport error");
                }
                self.finish(user_id, call_id, CallStatus::Ended).await
            }
        }
    }

    /// A fresh starter for the call; `seed` defaults to a random one.
    pub async fn icebreaker(
        &self,
        user_id: Uuid,
        call_id: Uuid,
        seed: Option<String>,
    ) -> Result<String, ServerError> {
        let (me, counterpart) = self
            .db
            .call(move |db| {
                let call = db.get_call(call_id)?;
                let counterpart_id = call
                    .counterpart_of(user_id)
                    .ok_or(hive_store::StoreError::NotParticipant)?;
                Ok((db.get_user(user_id)?, db.get_user(counterpart_id)?))
            })
            .await?;

        let seed = seed.unwrap_or_else(|| Uuid::new_v4().to_string());
        Ok(self
            .icebreakers
            .generate(&me.interests, &counterpart.interests, &seed)
            .await)
    }

    async fn finish(
        &self,
        user_id: Uuid,
        call_id: Uuid,
        status: CallStatus,
    ) -> Result<Call, ServerError> {
        let (call, changed) = self
            .db
            .call(move |db| Ok(db.end_call(call_id, user_id, status, Utc::now())?))
            .await?;
        if changed {
            self.notify_counterpart(&call, user_id).await;
        }
        Ok(call)
    }

    async fn notify_counterpart(&self, call: &Call, user_id: Uuid) {
        if let Some(counterpart) = call.counterpart_of(user_id) {
            self.events
                .publish(counterpart, UserEvent::CallUpdated { call: call.clone() })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, user, waiting_call};
    use hive_shared::ReportReason;
    use std::time::Duration;

    fn manager(db: &Db, events: &EventHub, require_both: bool) -> CallManager {
        CallManager::new(
            db.clone(),
            events.clone(),
            MediaTokenIssuer::new(&[5u8; 32], "hive-test".into(), Duration::from_secs(600)),
            IcebreakerService::offline(),
            require_both,
        )
    }

    #[tokio::test]
    async fn test_join_returns_credentials_and_prompt() {
        let db = memory_db();
        let events = EventHub::new();
        let calls = manager(&db, &events, false);
        let call = waiting_call(&db).await;

        let joined = calls.join(call.callee_id, call.id).await.unwrap();
        assert_eq!(joined.call.status, CallStatus::Connected);
        assert_eq!(joined.counterpart.id, call.caller_id);
        assert_eq!(joined.channel_name, call.channel_name);
        assert_eq!(joined.media_app_id, "hive-test");
        assert_eq!(joined.icebreaker, "I see we both like Music! What got you into it?");
        calls
            .media
            .verify(&joined.media_token, &call.channel_name, Utc::now())
            .unwrap();

        assert!(matches!(
            events.take_next(call.caller_id).await,
            Some(UserEvent::CallUpdated { .. })
        ));
    }

    #[tokio::test]
    async fn test_require_both_joined() {
        let db = memory_db();
        let events = EventHub::new();
        let calls = manager(&db, &events, true);
        let call = waiting_call(&db).await;

        let first = calls.join(call.caller_id, call.id).await.unwrap();
        assert_eq!(first.call.status, CallStatus::Connecting);

        let acked = calls
            .media_event(call.caller_id, call.id, MediaEvent::PeerJoined)
            .await
            .unwrap();
        assert_eq!(acked.status, CallStatus::Connected);
    }

    #[tokio::test]
    async fn test_outsider_is_forbidden() {
        let db = memory_db();
        let events = EventHub::new();
        let calls = manager(&db, &events, false);
        let call = waiting_call(&db).await;
        let stranger = user(&db, "Stranger", &["Art"]).await;

        assert!(matches!(
            calls.get(stranger, call.id).await,
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(
            calls.join(stranger, call.id).await,
            Err(ServerError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_mutual_friend_press_forms_friendship_once() {
        let db = memory_db();
        let events = EventHub::new();
        let calls = manager(&db, &events, false);
        let call = waiting_call(&db).await;
        calls.join(call.caller_id, call.id).await.unwrap();
        calls.join(call.callee_id, call.id).await.unwrap();
        while events.take_next(call.caller_id).await.is_some() {}
        while events.take_next(call.callee_id).await.is_some() {}

        let first = calls.press_friend(call.caller_id, call.id).await.unwrap();
        assert!(first.friendship.is_none());

        let second = calls.press_friend(call.callee_id, call.id).await.unwrap();
        let friendship = second.friendship.unwrap();
        assert!(friendship.involves(call.caller_id));

        let again = calls.press_friend(call.callee_id, call.id).await.unwrap();
        assert!(again.already_pressed);
        assert_eq!(again.friendship, Some(friendship.clone()));

        // caller: call_updated from the callee's press, then friendship_formed
        assert!(matches!(
            events.take_next(call.caller_id).await,
            Some(UserEvent::CallUpdated { .. })
        ));
        assert_eq!(
            events.take_next(call.caller_id).await,
            Some(UserEvent::FriendshipFormed { friendship })
        );
        assert_eq!(events.take_next(call.caller_id).await, None);
    }

    #[tokio::test]
    async fn test_report_ends_call_as_reported() {
        let db = memory_db();
        let events = EventHub::new();
        let calls = manager(&db, &events, false);
        let call = waiting_call(&db).await;
        calls.join(call.caller_id, call.id).await.unwrap();

        let report = calls
            .report(
                call.caller_id,
                call.id,
                ReportRequest {
                    reason: ReportReason::Harassment,
                    description: Some("rude".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(report.reported_user_id, call.callee_id);

        let stored = calls.get(call.caller_id, call.id).await.unwrap();
        assert_eq!(stored.status, CallStatus::Reported);
        assert!(stored.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_end_is_idempotent_and_transport_error_ends() {
        let db = memory_db();
        let events = EventHub::new();
        let calls = manager(&db, &events, false);
        let call = waiting_call(&db).await;
        calls.join(call.caller_id, call.id).await.unwrap();

        let ended = calls
            .media_event(call.callee_id, call.id, MediaEvent::Error)
            .await
            .unwrap();
        assert_eq!(ended.status, CallStatus::Ended);

        let again = calls.end(call.caller_id, call.id).await.unwrap();
        assert_eq!(again, ended);

        assert!(matches!(
            calls.join(call.caller_id, call.id).await,
            Err(ServerError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_rating_validated() {
        let db = memory_db();
        let events = EventHub::new();
        let calls = manager(&db, &events, false);
        let call = waiting_call(&db).await;
        calls.join(call.caller_id, call.id).await.unwrap();

        assert!(matches!(
            calls.rate(call.caller_id, call.id, 9).await,
            Err(ServerError::Validation(_))
        ));
        let rated = calls.rate(call.caller_id, call.id, 4).await.unwrap();
        assert_eq!(rated.caller_rating, Some(4));
    }
}
