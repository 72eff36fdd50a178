use std::sync::Arc;
use std::time::Duration;

use hive_shared::protocol::{SearchStopped, UserEvent};
use hive_shared::SearchFilters;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::call_store::CallStore;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::game_store::GameStore;
use crate::search::{self, SearchState, SearchStatus};
use crate::session::SessionStore;

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    pub(crate) api: ApiClient,
    pub(crate) session: SessionStore,
    pub(crate) calls: CallStore,
    pub(crate) games: GameStore,
    pub(crate) search: watch::Sender<SearchStatus>,
}

/// One signed-in VideoHive user: the stores plus the match search.
#[derive(Clone)]
pub struct HiveClient {
    inner: Arc<Inner>,
}

impl HiveClient {
    pub fn new(config: ClientConfig) -> Self {
        let api = ApiClient::new(config.base_url.clone());
        let (search, _) = watch::channel(SearchStatus::default());
        Self {
            inner: Arc::new(Inner {
                session: SessionStore::new(api.clone()),
                calls: CallStore::new(api.clone()),
                games: GameStore::new(api.clone()),
                api,
                config,
                search,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub fn calls(&self) -> &CallStore {
        &self.inner.calls
    }

    pub fn games(&self) -> &GameStore {
        &self.inner.games
    }

    // -- Search -------------------------------------------------------------

    /// Enqueue with `filters` and keep searching in the background until a
    /// match was joined, the search timed out, or it was stopped.
    ///
    /// A search already running is replaced.
    pub async fn start_search(&self, filters: SearchFilters) -> Result<(), ClientError> {
        filters.validate()?;
        if !self.inner.session.is_authenticated() {
            return Err(ClientError::AuthRequired);
        }

        let generation = search::next_generation(&self.inner.search, SearchState::Searching);
        if let Err(e) = self.inner.api.start_search(&filters).await {
            self.inner.search.send_if_modified(|s| {
                if s.generation != generation {
                    return false;
                }
                s.state = SearchState::Idle;
                true
            });
            return Err(e);
        }

        info!(generation, "search started");
        tokio::spawn(search::run_search(self.inner.clone(), generation, filters));
        Ok(())
    }

    /// Cancel the running search. Nothing the old search still receives is
    /// applied afterwards.
    pub async fn stop_search(&self) -> Result<SearchStopped, ClientError> {
        let generation = search::next_generation(&self.inner.search, SearchState::Idle);
        debug!(generation, "search stopped");
        self.inner.api.stop_search().await
    }

    pub fn is_searching(&self) -> bool {
        self.inner.search.borrow().state == SearchState::Searching
    }

    pub fn search_state(&self) -> SearchState {
        self.inner.search.borrow().state.clone()
    }

    /// Watch search transitions, e.g. to wait for [`SearchState::Matched`].
    pub fn watch_search(&self) -> watch::Receiver<SearchStatus> {
        self.inner.search.subscribe()
    }

    /// Wait until the search left [`SearchState::Searching`], or `timeout`.
    pub async fn search_settled(&self, timeout: Duration) -> SearchState {
        let mut rx = self.watch_search();
        let settled = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| s.state != SearchState::Searching),
        )
        .await;
        match settled {
            Ok(Ok(status)) => status.state.clone(),
            _ => self.search_state(),
        }
    }

    // -- Calls --------------------------------------------------------------

    /// Hang up the current call and drop its game.
    pub async fn end_call(&self) -> Result<(), ClientError> {
        self.inner.calls.end().await?;
        self.inner.games.clear().await;
        Ok(())
    }

    // -- Events -------------------------------------------------------------

    /// Fetch the next pushed event and fold it into the stores.
    pub async fn pump_events(&self, timeout: Duration) -> Result<Option<UserEvent>, ClientError> {
        let Some(event) = self.inner.api.next_event(timeout).await? else {
            return Ok(None);
        };
        self.apply_event(&event).await;
        Ok(Some(event))
    }

    pub async fn apply_event(&self, event: &UserEvent) {
        let had_call = self.inner.calls.in_call().await;
        self.inner.calls.apply_event(event).await;
        self.inner.games.apply_event(event).await;
        if had_call && !self.inner.calls.in_call().await {
            self.inner.games.clear().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_requires_valid_filters_and_session() {
        let client = HiveClient::new(ClientConfig::new("http://127.0.0.1:9"));

        let bad = SearchFilters {
            age_range: Some([40, 20]),
            ..Default::default()
        };
        assert!(matches!(
            client.start_search(bad).await,
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            client.start_search(SearchFilters::default()).await,
            Err(ClientError::AuthRequired)
        ));
        assert!(!client.is_searching());
        assert_eq!(client.search_state(), SearchState::Idle);
    }
}
