use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hive_shared::protocol::{MatchStatus, SearchStarted, SearchStopped, StartSearchRequest, WaitOutcome};
use serde::Deserialize;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Debug, Deserialize)]
pub(super) struct WaitParams {
    timeout_secs: Option<u64>,
}

pub(super) async fn start_search(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<StartSearchRequest>,
) -> Result<Json<SearchStarted>, ServerError> {
    Ok(Json(state.matchmaker.start_search(user_id, request.filters).await?))
}

pub(super) async fn stop_search(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SearchStopped>, ServerError> {
    Ok(Json(state.matchmaker.stop_search(user_id).await?))
}

pub(super) async fn status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MatchStatus>, ServerError> {
    Ok(Json(state.matchmaker.status(user_id).await?))
}

pub(super) async fn wait(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<WaitParams>,
) -> Result<Json<WaitOutcome>, ServerError> {
    let timeout = state.wait_timeout(params.timeout_secs);
    Ok(Json(state.matchmaker.wait(user_id, timeout).await?))
}

/// Next pushed event for the caller, `204 No Content` on timeout.
pub(super) async fn next_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<WaitParams>,
) -> Response {
    let timeout = state.wait_timeout(params.timeout_secs);
    match state.events.next_event(user_id, timeout).await {
        Some(event) => Json(event).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::*;
    use axum::http::StatusCode;
    use hive_shared::protocol::{SearchStarted, WaitOutcome};
    use serde_json::json;

    #[tokio::test]
    async fn test_search_match_and_wait() {
        let app = test_router();
        let alice = register(&app, "Alice", &["Music"]).await;
        let bob = register(&app, "Bob", &["Music"]).await;

        let (status, body) = send(&app, "POST", "/matchmaking/search", Some(&alice.session_token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let started: SearchStarted = parse(body);
        assert!(started.searching);

        let (_, body) = send(&app, "GET", "/matchmaking/status", Some(&alice.session_token), None).await;
        assert_eq!(body["queued"], true);

        let (_, body) = send(
            &app,
            "POST",
            "/matchmaking/search",
            Some(&bob.session_token),
            Some(json!({ "filters": { "interests": ["Music"] } })),
        )
        .await;
        let matched: SearchStarted = parse(body);
        let call = matched.call.unwrap();
        assert_eq!(call.caller_id, alice.user.id);

        let (status, body) = send(
            &app,
            "GET",
            "/matchmaking/wait?timeout_secs=1",
            Some(&alice.session_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<WaitOutcome>(body), WaitOutcome::Matched { call: call.clone() });

        let (status, body) = send(&app, "GET", "/events?timeout_secs=1", Some(&alice.session_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "match_found");
        assert_eq!(body["call"]["id"], json!(call.id));
    }

    #[tokio::test]
    async fn test_events_timeout_is_204() {
        let app = test_router();
        let alice = register(&app, "Alice", &["Music"]).await;

        let (status, body) = send(&app, "GET", "/events?timeout_secs=0", Some(&alice.session_token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_stop_search_and_bad_filters() {
        let app = test_router();
        let alice = register(&app, "Alice", &["Music"]).await;

        let (status, _) = send(
            &app,
            "POST",
            "/matchmaking/search",
            Some(&alice.session_token),
            Some(json!({ "filters": { "genders": ["Robot"] } })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        send(&app, "POST", "/matchmaking/search", Some(&alice.session_token), Some(json!({}))).await;
        let (status, body) = send(&app, "DELETE", "/matchmaking/search", Some(&alice.session_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["searching"], false);
        assert_eq!(body["canceled_call"], serde_json::Value::Null);

        let (_, body) = send(&app, "GET", "/matchmaking/wait?timeout_secs=1", Some(&alice.session_token), None).await;
        assert_eq!(body["outcome"], "not_searching");
    }
}
