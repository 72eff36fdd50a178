//! Per-user push notifications.
//!
//! Every published event lands in the user's mailbox (drained by
//! `GET /events`) and is broadcast live to in-process waiters such as the
//! matchmaking long poll. Waiters subscribe before checking stored state so
//! nothing published in between is missed.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use hive_shared::protocol::UserEvent;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use uuid::Uuid;

/// Oldest events are dropped once a mailbox holds this many.
const MAILBOX_CAPACITY: usize = 64;

const BROADCAST_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventHub {
    mailboxes: Arc<Mutex<HashMap<Uuid, VecDeque<UserEvent>>>>,
    live: broadcast::Sender<(Uuid, UserEvent)>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            mailboxes: Arc::new(Mutex::new(HashMap::new())),
            live,
        }
    }

    pub async fn publish(&self, user_id: Uuid, event: UserEvent) {
        {
            let mut mailboxes = self.mailboxes.lock().await;
            let mailbox = mailboxes.entry(user_id).or_default();
            if mailbox.len() >= MAILBOX_CAPACITY {
                mailbox.pop_front();
                tracing::debug!(user_id = %user_id, "mailbox full, dropped oldest event");
            }
            mailbox.push_back(event.clone());
        }
        // No live subscribers is fine; the mailbox still has it.
        let _ = self.live.send((user_id, event));
    }

    /// Pop the oldest undelivered event for `user_id`.
    pub async fn take_next(&self, user_id: Uuid) -> Option<UserEvent> {
        let mut mailboxes = self.mailboxes.lock().await;
        let mailbox = mailboxes.get_mut(&user_id)?;
        let event = mailbox.pop_front();
        if mailbox.is_empty() {
            mailboxes.remove(&user_id);
        }
        event
    }

    /// Live feed of events for `user_id`, starting now.
    pub fn subscribe(&self, user_id: Uuid) -> Subscription {
        Subscription {
            user_id,
            rx: self.live.subscribe(),
        }
    }

    /// Long poll on the mailbox: the next event, or `None` after `timeout`.
    pub async fn next_event(&self, user_id: Uuid, timeout: Duration) -> Option<UserEvent> {
        let mut subscription = self.subscribe(user_id);
        if let Some(event) = self.take_next(user_id).await {
            return Some(event);
        }

        let deadline = Instant::now() + timeout;
        while subscription.recv_until(deadline).await.is_some() {
            if let Some(event) = self.take_next(user_id).await {
                return Some(event);
            }
            // Another poller drained it first.
        }
        None
    }
}

pub struct Subscription {
    user_id: Uuid,
    rx: broadcast::Receiver<(Uuid, UserEvent)>,
}

impl Subscription {
    /// The next live event addressed to this user, or `None` at `deadline`.
    pub async fn recv_until(&mut self, deadline: Instant) -> Option<UserEvent> {
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Err(_) => return None,
                Ok(Ok((user_id, event))) if user_id == self.user_id => return Some(event),
                Ok(Ok(_)) => continue,
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    tracing::warn!(user_id = %self.user_id, skipped, "event subscriber lagged");
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
            }
        }
    }
}
