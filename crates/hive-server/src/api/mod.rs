use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::Method,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use hive_store::Database;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::SessionIssuer;
use crate::calls::CallManager;
use crate::config::ServerConfig;
use crate::db::Db;
use crate::events::EventHub;
use crate::games::GameCoordinator;
use crate::icebreaker::IcebreakerService;
use crate::matchmaker::Matchmaker;
use crate::media::MediaTokenIssuer;
use crate::rate_limit::{limit_by_ip, RateLimiter, SearchLimiter};

mod calls;
mod games;
mod matchmaking;
mod social;
mod users;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub events: EventHub,
    pub sessions: SessionIssuer,
    pub matchmaker: Matchmaker,
    pub calls: CallManager,
    pub games: GameCoordinator,
    pub rate_limiter: RateLimiter<IpAddr>,
    pub search_limiter: SearchLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig, database: Database) -> Self {
        let db = Db::new(database);
        let events = EventHub::new();
        let search_limiter = SearchLimiter::new(config.search_rate_per_sec, config.search_burst);

        let media = MediaTokenIssuer::new(
            &config.token_secret,
            config.media_app_id.clone(),
            config.media_token_ttl,
        );
        let icebreakers = IcebreakerService::new(config.prompt_api_url.clone(), config.prompt_timeout);

        Self {
            sessions: SessionIssuer::new(&config.token_secret, config.session_ttl),
            matchmaker: Matchmaker::new(db.clone(), events.clone(), search_limiter.clone()),
            calls: CallManager::new(
                db.clone(),
                events.clone(),
                media,
                icebreakers,
                config.require_both_joined,
            ),
            games: GameCoordinator::new(db.clone(), events.clone()),
            rate_limiter: RateLimiter::new(config.rate_limit_rps, config.rate_limit_burst),
            search_limiter,
            db,
            events,
            config: Arc::new(config),
        }
    }

    /// Clamp a client-requested long-poll duration to the configured maximum.
    pub(crate) fn wait_timeout(&self, requested_secs: Option<u64>) -> Duration {
        let max = self.config.match_wait_max;
        requested_secs
            .map(Duration::from_secs)
            .map_or(max, |requested| requested.min(max))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        // Profiles
        .route("/users", post(users::register))
        .route("/users/me", get(users::me).patch(users::update_me))
        .route("/users/me/presence", post(users::set_presence))
        .route("/users/{id}", get(users::public_profile))
        // Matchmaking
        .route(
            "/matchmaking/search",
            post(matchmaking::start_search).delete(matchmaking::stop_search),
        )
        .route("/matchmaking/status", get(matchmaking::status))
        .route("/matchmaking/wait", get(matchmaking::wait))
        .route("/events", get(matchmaking::next_event))
        // Calls
        .route("/calls/{id}", get(calls::get_call))
        .route("/calls/{id}/join", post(calls::join))
        .route("/calls/{id}/end", post(calls::end))
        .route("/calls/{id}/friend", post(calls::press_friend))
        .route("/calls/{id}/report", post(calls::report))
        .route("/calls/{id}/rate", post(calls::rate))
        .route("/calls/{id}/media-events", post(calls::media_event))
        .route("/calls/{id}/icebreaker", get(calls::icebreaker))
        // Social
        .route("/friends", get(social::friends))
        .route(
            "/conversations",
            get(social::list_conversations).post(social::start_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            get(social::messages).post(social::send_message),
        )
        .route("/conversations/{id}/read", post(social::mark_read))
        // Mini-games
        .route("/calls/{id}/games", post(games::start))
        .route("/games/{id}", get(games::get_game))
        .route("/games/{id}/state", put(games::update_state))
        .route("/games/{id}/moves", post(games::submit_move))
        .route("/games/{id}/end", post(games::end))
        .route("/trivia", get(games::trivia))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            limit_by_ip,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize, Deserialize)]
struct ServerInfoResponse {
    name: String,
    version: String,
    require_both_joined: bool,
    match_wait_max_secs: u64,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

async fn server_info(axum::extract::State(state): axum::extract::State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION").into(),
        require_both_joined: state.config.require_both_joined,
        match_wait_max_secs: state.config.match_wait_max.as_secs(),
    })
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(state, listener).await
}

/// Serve on an already bound listener.
pub async fn serve_on(state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let app = build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_and_info() {
        let app = test_router();

        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, "GET", "/info", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "VideoHive");
        assert_eq!(body["match_wait_max_secs"], 2);
    }

    #[tokio::test]
    async fn test_auth_required() {
        let app = test_router();

        let (status, body) = send(&app, "GET", "/users/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("bearer"));

        let (status, _) = send(&app, "GET", "/users/me", Some("not.a-token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_file_backed_state() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open_at(&dir.path().join("hive.db")).unwrap();
        let app = build_router(AppState::new(ServerConfig::default(), database));

        let registered = register(&app, "Disk", &["Books"]).await;
        let (status, body) = send(
            &app,
            "GET",
            "/users/me",
            Some(&registered.session_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["display_name"], "Disk");
    }

    #[test]
    fn test_wait_timeout_is_clamped() {
        let state = AppState::new(ServerConfig::default(), Database::open_in_memory().unwrap());
        assert_eq!(state.wait_timeout(None), Duration::from_secs(30));
        assert_eq!(state.wait_timeout(Some(5)), Duration::from_secs(5));
        assert_eq!(state.wait_timeout(Some(500)), Duration::from_secs(30));
    }
}
