//! Queue-backed pairing of searching users.

use std::time::Duration;

use chrono::Utc;
use hive_shared::models::Call;
use hive_shared::protocol::{MatchStatus, SearchStarted, SearchStopped, UserEvent, WaitOutcome};
use hive_shared::SearchFilters;
use hive_store::EnqueueOutcome;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::Db;
use crate::error::ServerError;
use crate::events::EventHub;
use crate::rate_limit::SearchLimiter;

#[derive(Clone)]
pub struct Matchmaker {
    db: Db,
    events: EventHub,
    limiter: SearchLimiter,
}

impl Matchmaker {
    pub fn new(db: Db, events: EventHub, limiter: SearchLimiter) -> Self {
        Self { db, events, limiter }
    }

    /// Enqueue `user_id` and try to pair with the oldest compatible searcher.
    ///
    /// A call left over from an earlier match the user never joined is
    /// canceled first, so the new search cannot be answered with it.
    pub async fn start_search(
        &self,
        user_id: Uuid,
        filters: SearchFilters,
    ) -> Result<SearchStarted, ServerError> {
        filters.validate()?;
        if !self.limiter.check(user_id).await {
            warn!(user_id = %user_id, "search rate limit exceeded");
            return Err(ServerError::RateLimited);
        }

        let (stale, outcome) = self
            .db
            .call(move |db| {
                let now = Utc::now();
                let stale = db.dequeue(user_id, now)?.canceled_call;
                let outcome = db.enqueue_and_match(user_id, &filters, now)?;
                Ok((stale, outcome))
            })
            .await?;

        if let Some(call) = stale {
            self.notify_canceled(&call, user_id).await;
        }

        match outcome {
            EnqueueOutcome::Queued(entry) => {
                debug!(user_id = %user_id, seq = entry.seq, "searching");
                Ok(SearchStarted {
                    searching: true,
                    call: None,
                })
            }
            EnqueueOutcome::Matched(call) => {
                info!(
                    call_id = %call.id,
                    caller = %call.caller_id,
                    callee = %call.callee_id,
                    "match found"
                );
                for participant in [call.caller_id, call.callee_id] {
                    self.events
                        .publish(participant, UserEvent::MatchFound { call: call.clone() })
                        .await;
                }
                Ok(SearchStarted {
                    searching: false,
                    call: Some(call),
                })
            }
        }
    }

    /// Leave the queue. A match created in the meantime is canceled and the
    /// counterpart is told to search again.
    pub async fn stop_search(&self, user_id: Uuid) -> Result<SearchStopped, ServerError> {
        let dequeued = self
            .db
            .call(move |db| Ok(db.dequeue(user_id, Utc::now())?))
            .await?;

        if let Some(call) = &dequeued.canceled_call {
            self.notify_canceled(call, user_id).await;
        } else if dequeued.removed {
            debug!(user_id = %user_id, "search stopped");
        }

        Ok(SearchStopped {
            searching: false,
            canceled_call: dequeued.canceled_call.map(|call| call.id),
        })
    }

    /// The poll query: is the user queued, and is a call waiting for them to join.
    pub async fn status(&self, user_id: Uuid) -> Result<MatchStatus, ServerError> {
        self.db
            .call(move |db| {
                Ok(MatchStatus {
                    queued: db.queue_entry(user_id)?.is_some(),
                    call: db.pending_call_for(user_id)?,
                })
            })
            .await
    }

    /// Block until a match or cancellation concerns `user_id`, or `timeout`.
    pub async fn wait(&self, user_id: Uuid, timeout: Duration) -> Result<WaitOutcome, ServerError> {
        let mut subscription = self.events.subscribe(user_id);

        let status = self.status(user_id).await?;
        if let Some(call) = status.call {
            return Ok(WaitOutcome::Matched { call });
        }
        if !status.queued {
            return Ok(WaitOutcome::NotSearching);
        }

        let deadline = Instant::now() + timeout;
        while let Some(event) = subscription.recv_until(deadline).await {
            match event {
                UserEvent::MatchFound { call } => return Ok(WaitOutcome::Matched { call }),
                UserEvent::CallCanceled { call_id } => return Ok(WaitOutcome::Canceled { call_id }),
                _ => {}
            }
        }

        debug!(user_id = %user_id, "match wait timed out");
        Ok(WaitOutcome::Pending)
    }

    async fn notify_canceled(&self, call: &Call, by: Uuid) {
        if let Some(counterpart) = call.counterpart_of(by) {
            self.events
                .publish(counterpart, UserEvent::CallCanceled { call_id: call.id })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use hive_shared::CallStatus;
    use hive_store::Database;

    fn setup() -> (Matchmaker, Db, EventHub) {
        let db = Db::new(Database::open_in_memory().unwrap());
        let events = EventHub::new();
        let matchmaker = Matchmaker::new(db.clone(), events.clone(), SearchLimiter::new(100.0, 100.0));
        (matchmaker, db, events)
    }

    async fn user(db: &Db, name: &str) -> Uuid {
        test_support::user(db, name, &["Music"]).await
    }

    #[tokio::test]
    async fn test_second_searcher_claims_first() {
        let (mm, db, events) = setup();
        let alice = user(&db, "Alice").await;
        let bob = user(&db, "Bob").await;

        let first = mm.start_search(alice, SearchFilters::default()).await.unwrap();
        assert!(first.searching);
        assert!(first.call.is_none());

        let second = mm.start_search(bob, SearchFilters::default()).await.unwrap();
        let call = second.call.unwrap();
        assert_eq!((call.caller_id, call.callee_id), (alice, bob));
        assert_eq!(call.status, CallStatus::Waiting);

        assert_eq!(
            events.take_next(alice).await,
            Some(UserEvent::MatchFound { call: call.clone() })
        );
        assert_eq!(
            mm.wait(alice, Duration::from_millis(10)).await.unwrap(),
            WaitOutcome::Matched { call }
        );
    }

    #[tokio::test]
    async fn test_wait_wakes_on_match() {
        let (mm, db, _) = setup();
        let alice = user(&db, "Alice").await;
        let bob = user(&db, "Bob").await;
        mm.start_search(alice, SearchFilters::default()).await.unwrap();

        let waiter = {
            let mm = mm.clone();
            tokio::spawn(async move { mm.wait(alice, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let call = mm
            .start_search(bob, SearchFilters::default())
            .await
            .unwrap()
            .call
            .unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), WaitOutcome::Matched { call });
    }

    #[tokio::test]
    async fn test_wait_pending_and_not_searching() {
        let (mm, db, _) = setup();
        let alice = user(&db, "Alice").await;

        assert_eq!(
            mm.wait(alice, Duration::from_millis(10)).await.unwrap(),
            WaitOutcome::NotSearching
        );
        mm.start_search(alice, SearchFilters::default()).await.unwrap();
        assert_eq!(
            mm.wait(alice, Duration::from_millis(20)).await.unwrap(),
            WaitOutcome::Pending
        );
    }

    #[tokio::test]
    async fn test_cancel_after_match_notifies_counterpart() {
        let (mm, db, events) = setup();
        let alice = user(&db, "Alice").await;
        let bob = user(&db, "Bob").await;
        mm.start_search(alice, SearchFilters::default()).await.unwrap();
        let call = mm
            .start_search(bob, SearchFilters::default())
            .await
            .unwrap()
            .call
            .unwrap();
        let _ = events.take_next(bob).await;

        let stopped = mm.stop_search(alice).await.unwrap();
        assert_eq!(stopped.canceled_call, Some(call.id));
        assert_eq!(
            events.take_next(bob).await,
            Some(UserEvent::CallCanceled { call_id: call.id })
        );

        let id = call.id;
        let stored = db.call(move |db| Ok(db.get_call(id)?)).await.unwrap();
        assert_eq!(stored.status, CallStatus::Canceled);
        assert_eq!(mm.status(bob).await.unwrap().call, None);
    }

    #[tokio::test]
    async fn test_invalid_filters_rejected_before_queueing() {
        let (mm, db, _) = setup();
        let alice = user(&db, "Alice").await;
        let filters = SearchFilters {
            age_range: Some([30, 20]),
            ..Default::default()
        };

        let err = mm.start_search(alice, filters).await.unwrap_err();
        assert!(matches!(err, ServerError::Validation(_)));
        assert!(!mm.status(alice).await.unwrap().queued);
    }

    #[tokio::test]
    async fn test_search_rate_limit() {
        let db = Db::new(Database::open_in_memory().unwrap());
        let mm = Matchmaker::new(db.clone(), EventHub::new(), SearchLimiter::new(0.01, 1.0));
        let alice = user(&db, "Alice").await;

        mm.start_search(alice, SearchFilters::default()).await.unwrap();
        let err = mm.start_search(alice, SearchFilters::default()).await.unwrap_err();
        assert!(matches!(err, ServerError::RateLimited));
    }
}
