//! Background match search.
//!
//! Each search runs as its own task tagged with a generation number. Starting
//! or stopping a search bumps the generation; a task whose generation is no
//! longer current exits without touching any store, and a call it joined in
//! the meantime is ended again.

use std::sync::Arc;
use std::time::Duration;

use hive_shared::protocol::WaitOutcome;
use hive_shared::SearchFilters;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::Inner;
use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Searching,
    /// The match was joined; the call store holds it.
    Matched { call_id: Uuid },
    /// Nobody compatible turned up in time; the user was dequeued.
    TimedOut,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchStatus {
    pub generation: u64,
    pub state: SearchState,
}

impl Default for SearchStatus {
    fn default() -> Self {
        Self {
            generation: 0,
            state: SearchState::Idle,
        }
    }
}

/// Move to a new generation and return it.
pub(crate) fn next_generation(status: &watch::Sender<SearchStatus>, state: SearchState) -> u64 {
    let mut generation = 0;
    status.send_modify(|s| {
        s.generation += 1;
        s.state = state;
        generation = s.generation;
    });
    generation
}

/// Publish `state` unless a newer search has started. Returns whether it was applied.
fn publish(status: &watch::Sender<SearchStatus>, generation: u64, state: SearchState) -> bool {
    status.send_if_modified(|s| {
        if s.generation != generation {
            return false;
        }
        s.state = state;
        true
    })
}

fn is_current(inner: &Inner, generation: u64) -> bool {
    inner.search.borrow().generation == generation
}

/// Resolves once `generation` is no longer the current search.
async fn superseded(rx: &mut watch::Receiver<SearchStatus>, generation: u64) {
    let _ = rx.wait_for(|s| s.generation != generation).await;
}

enum Step {
    Continue,
    Retry(ClientError),
    Done,
}

pub(crate) async fn run_search(inner: Arc<Inner>, generation: u64, filters: SearchFilters) {
    let mut rx = inner.search.subscribe();
    let deadline = Instant::now() + inner.config.search_timeout;
    let mut failures = 0u32;

    loop {
        let now = Instant::now();
        if now >= deadline {
            give_up(&inner, generation).await;
            return;
        }
        let wait = inner.config.wait_timeout.min(deadline - now);

        let outcome = tokio::select! {
            outcome = inner.api.wait_for_match(wait) => outcome,
            _ = superseded(&mut rx, generation) => {
                debug!(generation, "search superseded");
                return;
            }
        };

        let step = match outcome {
            Ok(WaitOutcome::Pending) => Step::Continue,
            Ok(WaitOutcome::Matched { call }) => join_match(&inner, generation, call.id).await,
            Ok(WaitOutcome::Canceled { call_id }) => {
                info!(call_id = %call_id, "match canceled by counterpart, searching again");
                requeue(&inner, generation, &filters).await
            }
            Ok(WaitOutcome::NotSearching) => requeue(&inner, generation, &filters).await,
            Err(e) if e.is_transient() => Step::Retry(e),
            Err(e) => {
                fail(&inner, generation, e);
                return;
            }
        };

        match step {
            Step::Done => return,
            Step::Continue => failures = 0,
            Step::Retry(e) => {
                failures += 1;
                let delay = inner.config.backoff(failures);
                warn!(error = %e, failures, delay_ms = delay.as_millis() as u64, "search request failed, backing off");
                if !sleep_unless_superseded(&mut rx, generation, delay).await {
                    return;
                }
            }
        }
    }
}

async fn join_match(inner: &Arc<Inner>, generation: u64, call_id: Uuid) -> Step {
    let joined = match inner.api.join_call(call_id).await {
        Ok(joined) => joined,
        // Canceled or ended before we got there.
        Err(e) if e.is_status(409) || e.is_status(404) => {
            debug!(call_id = %call_id, "matched call gone before join");
            return Step::Continue;
        }
        Err(e) if e.is_transient() => return Step::Retry(e),
        Err(e) => {
            fail(inner, generation, e);
            return Step::Done;
        }
    };

    if !is_current(inner, generation) {
        abandon(inner, call_id).await;
        return Step::Done;
    }

    inner.calls.adopt_joined(joined).await;
    if !publish(&inner.search, generation, SearchState::Matched { call_id }) {
        abandon(inner, call_id).await;
    }
    Step::Done
}

/// Put the user back in the queue. A claim made by this enqueue is picked
/// up by the next wait.
async fn requeue(inner: &Arc<Inner>, generation: u64, filters: &SearchFilters) -> Step {
    if !is_current(inner, generation) {
        return Step::Done;
    }
    match inner.api.start_search(filters).await {
        Ok(_) => Step::Continue,
        Err(e) if e.is_transient() => Step::Retry(e),
        Err(e) => {
            fail(inner, generation, e);
            Step::Done
        }
    }
}

async fn abandon(inner: &Arc<Inner>, call_id: Uuid) {
    info!(call_id = %call_id, "search was canceled during join, leaving call");
    if let Err(e) = inner.calls.abandon(call_id).await {
        warn!(call_id = %call_id, error = %e, "failed to leave abandoned call");
    }
}

async fn give_up(inner: &Arc<Inner>, generation: u64) {
    if !is_current(inner, generation) {
        return;
    }
    info!(generation, "no match within the search timeout");
    if let Err(e) = inner.api.stop_search().await {
        warn!(error = %e, "failed to leave the queue after timeout");
    }
    publish(&inner.search, generation, SearchState::TimedOut);
}

fn fail(inner: &Arc<Inner>, generation: u64, error: ClientError) {
    warn!(error = %error, "search failed");
    publish(
        &inner.search,
        generation,
        SearchState::Failed {
            message: error.to_string(),
        },
    );
}

/// Returns `false` if the search was superseded while sleeping.
async fn sleep_unless_superseded(
    rx: &mut watch::Receiver<SearchStatus>,
    generation: u64,
    delay: Duration,
) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = superseded(rx, generation) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_generation_cannot_publish() {
        let (tx, _rx) = watch::channel(SearchStatus::default());
        let first = next_generation(&tx, SearchState::Searching);
        let second = next_generation(&tx, SearchState::Searching);

        assert!(!publish(&tx, first, SearchState::TimedOut));
        assert_eq!(tx.borrow().state, SearchState::Searching);

        assert!(publish(&tx, second, SearchState::TimedOut));
        assert_eq!(
            *tx.borrow(),
            SearchStatus {
                generation: second,
                state: SearchState::TimedOut
            }
        );
    }

    #[tokio::test]
    async fn test_superseded_resolves_on_bump() {
        let (tx, mut rx) = watch::channel(SearchStatus::default());
        let generation = next_generation(&tx, SearchState::Searching);

        let slept = sleep_unless_superseded(&mut rx, generation, Duration::from_millis(5)).await;
        assert!(slept);

        next_generation(&tx, SearchState::Idle);
        let slept = sleep_unless_superseded(&mut rx, generation, Duration::from_secs(5)).await;
        assert!(!slept);
    }
}
