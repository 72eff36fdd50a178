use axum::extract::{Path, Query, State};
use axum::Json;
use hive_shared::constants::DEFAULT_TRIVIA_POOL;
use hive_shared::models::{GameSession, TriviaQuestion};
use hive_shared::protocol::{
    EndGameRequest, MoveAccepted, StartGameRequest, SubmitMoveRequest, UpdateGameStateRequest,
};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Debug, Deserialize)]
pub(super) struct TriviaParams {
    limit: Option<u32>,
}

pub(super) async fn start(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(call_id): Path<Uuid>,
    Json(request): Json<StartGameRequest>,
) -> Result<Json<GameSession>, ServerError> {
    Ok(Json(state.games.start(user_id, call_id, request.game_type).await?))
}

pub(super) async fn get_game(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSession>, ServerError> {
    Ok(Json(state.games.get(user_id, id).await?))
}

pub(super) async fn update_state(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateGameStateRequest>,
) -> Result<Json<GameSession>, ServerError> {
    let session = state
        .games
        .update_state(user_id, id, request.state, request.expected_version)
        .await?;
    Ok(Json(session))
}

pub(super) async fn submit_move(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitMoveRequest>,
) -> Result<Json<MoveAccepted>, ServerError> {
    Ok(Json(state.games.submit_move(user_id, id, &request.choice).await?))
}

pub(super) async fn end(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<EndGameRequest>,
) -> Result<Json<GameSession>, ServerError> {
    Ok(Json(state.games.end(user_id, id, request.result).await?))
}

pub(super) async fn trivia(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Query(params): Query<TriviaParams>,
) -> Result<Json<Vec<TriviaQuestion>>, ServerError> {
    let limit = params.limit.unwrap_or(DEFAULT_TRIVIA_POOL).min(DEFAULT_TRIVIA_POOL);
    let questions = state
        .db
        .call(move |db| Ok(db.trivia_questions(limit)?))
        .await?;
    Ok(Json(questions))
}
