use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use hive_shared::models::User;
use hive_shared::protocol::{PresenceRequest, ProfileUpdateRequest, RegisterRequest, RegisterResponse};
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

pub(super) async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ServerError> {
    let profile = request.validate()?;
    let user = state
        .db
        .call(move |db| Ok(db.create_user(&profile, Utc::now())?))
        .await?;
    let session_token = state.sessions.issue(user.id, Utc::now())?;

    info!(user_id = %user.id, "user registered");
    Ok(Json(RegisterResponse {
        user,
        session_token,
    }))
}

pub(super) async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<User>, ServerError> {
    let user = state.db.call(move |db| Ok(db.get_user(user_id)?)).await?;
    Ok(Json(user))
}

pub(super) async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<ProfileUpdateRequest>,
) -> Result<Json<User>, ServerError> {
    let update = request.validate()?;
    let user = state
        .db
        .call(move |db| Ok(db.update_profile(user_id, &update, Utc::now())?))
        .await?;
    Ok(Json(user))
}

pub(super) async fn set_presence(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<PresenceRequest>,
) -> Result<Json<User>, ServerError> {
    let user = state
        .db
        .call(move |db| Ok(db.set_presence(user_id, request.online, Utc::now())?))
        .await?;
    Ok(Json(user))
}

/// Any signed-in user may look up a profile; contact details stay private.
pub(super) async fn public_profile(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ServerError> {
    let mut user = state.db.call(move |db| Ok(db.get_user(id)?)).await?;
    user.email = None;
    Ok(Json(user))
}
