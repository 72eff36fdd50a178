use axum::extract::{Path, Query, State};
use axum::Json;
use hive_shared::models::{Call, Report};
use hive_shared::protocol::{
    FriendPressOutcome, IcebreakerResponse, JoinedCall, MediaEventRequest, RateRequest, ReportRequest,
};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Debug, Deserialize)]
pub(super) struct IcebreakerParams {
    seed: Option<String>,
}

pub(super) async fn get_call(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Call>, ServerError> {
    Ok(Json(state.calls.get(user_id, id).await?))
}

pub(super) async fn join(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JoinedCall>, ServerError> {
    Ok(Json(state.calls.join(user_id, id).await?))
}

pub(super) async fn end(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Call>, ServerError> {
    Ok(Json(state.calls.end(user_id, id).await?))
}

pub(super) async fn press_friend(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FriendPressOutcome>, ServerError> {
    Ok(Json(state.calls.press_friend(user_id, id).await?))
}

pub(super) async fn report(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<Report>, ServerError> {
    Ok(Json(state.calls.report(user_id, id, request).await?))
}

pub(super) async fn rate(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<RateRequest>,
) -> Result<Json<Call>, ServerError> {
    Ok(Json(state.calls.rate(user_id, id, request.rating).await?))
}

pub(super) async fn media_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<MediaEventRequest>,
) -> Result<Json<Call>, ServerError> {
    Ok(Json(state.calls.media_event(user_id, id, request.event).await?))
}

pub(super) async fn icebreaker(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<IcebreakerParams>,
) -> Result<Json<IcebreakerResponse>, ServerError> {
    let prompt = state.calls.icebreaker(user_id, id, params.seed).await?;
    Ok(Json(IcebreakerResponse { prompt }))
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::*;
    use axum::http::StatusCode;
    use axum::Router;
    use hive_shared::models::Call;
    use hive_shared::protocol::{JoinedCall, RegisterResponse};
    use serde_json::json;

    async fn matched(app: &Router) -> (RegisterResponse, RegisterResponse, Call) {
        let alice = register(app, "Alice", &["Music", "Art"]).await;
        let bob = register(app, "Bob", &["Art"]).await;
        send(app, "POST", "/matchmaking/search", Some(&alice.session_token), Some(json!({}))).await;
        let (_, body) = send(app, "POST", "/matchmaking/search", Some(&bob.session_token), Some(json!({}))).await;
        let call: Call = parse(body["call"].clone());
        (alice, bob, call)
    }

    #[tokio::test]
    async fn test_join_press_and_end() {
        let app = test_router();
        let (alice, bob, call) = matched(&app).await;
        let uri = |action: &str| format!("/calls/{}/{action}", call.id);

        let (status, body) = send(&app, "POST", &uri("join"), Some(&alice.session_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let joined: JoinedCall = parse(body);
        assert_eq!(joined.counterpart.id, bob.user.id);
        assert_eq!(joined.icebreaker, "I see we both like Art! What got you into it?");
        assert!(!joined.media_token.is_empty());

        send(&app, "POST", &uri("join"), Some(&bob.session_token), None).await;

        let (_, body) = send(&app, "POST", &uri("friend"), Some(&alice.session_token), None).await;
        assert_eq!(body["friendship"], serde_json::Value::Null);
        let (_, body) = send(&app, "POST", &uri("friend"), Some(&bob.session_token), None).await;
        assert!(body["friendship"]["id"].is_string());

        let (_, body) = send(&app, "GET", "/friends", Some(&alice.session_token), None).await;
        assert_eq!(body[0]["friend"]["id"], json!(bob.user.id));

        let (status, body) = send(&app, "POST", &uri("end"), Some(&bob.session_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ended");
        let (status, again) = send(&app, "POST", &uri("end"), Some(&alice.session_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again, body);

        let (status, _) = send(&app, "POST", &uri("rate"), Some(&alice.session_token), Some(json!({ "rating": 5 }))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_report_and_outsiders() {
        let app = test_router();
        let (alice, bob, call) = matched(&app).await;
        let stranger = register(&app, "Eve", &["Books"]).await;
        let uri = |action: &str| format!("/calls/{}/{action}", call.id);

        let (status, _) = send(&app, "GET", &format!("/calls/{}", call.id), Some(&stranger.session_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, "POST", &uri("friend"), Some(&alice.session_token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        send(&app, "POST", &uri("join"), Some(&alice.session_token), None).await;
        let (status, body) = send(
            &app,
            "POST",
            &uri("report"),
            Some(&alice.session_token),
            Some(json!({ "reason": "spam", "description": "links everywhere" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reported_user_id"], json!(bob.user.id));

        let (_, body) = send(&app, "GET", &format!("/calls/{}", call.id), Some(&bob.session_token), None).await;
        assert_eq!(body["status"], "reported");
    }

    #[tokio::test]
    async fn test_media_events_and_icebreaker() {
        let app = test_router();
        let (alice, _bob, call) = matched(&app).await;
        let uri = |action: &str| format!("/calls/{}/{action}", call.id);

        send(&app, "POST", &uri("join"), Some(&alice.session_token), None).await;

        let (status, body) = send(&app, "GET", &format!("{}?seed=abc", uri("icebreaker")), Some(&alice.session_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["prompt"].as_str().unwrap().contains("Art"));

        let (status, body) = send(
            &app,
            "POST",
            &uri("media-events"),
            Some(&alice.session_token),
            Some(json!({ "event": "peer_left" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ended");
    }
}
