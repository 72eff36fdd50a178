//! Friends list and 1:1 messaging between friends.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use hive_shared::models::{Conversation, Message};
use hive_shared::protocol::{
    ConversationSummary, FriendEntry, SendMessageRequest, StartConversationRequest, UserEvent,
};
use hive_shared::validation::validate_message;
use hive_store::{Database, StoreError};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

const DEFAULT_PAGE: u32 = 50;
const MAX_PAGE: u32 = 200;

#[derive(Debug, Deserialize)]
pub(super) struct PageParams {
    limit: Option<u32>,
    offset: Option<u32>,
}

pub(super) async fn friends(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<FriendEntry>>, ServerError> {
    let entries = state
        .db
        .call(move |db| {
            let mut entries = Vec::new();
            for friendship in db.friendships_of(user_id)? {
                let Some(friend_id) = friendship.other_of(user_id) else {
                    continue;
                };
                let mut friend = db.get_user(friend_id)?;
                friend.email = None;
                entries.push(FriendEntry { friendship, friend });
            }
            Ok(entries)
        })
        .await?;
    Ok(Json(entries))
}

pub(super) async fn start_conversation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<StartConversationRequest>,
) -> Result<Json<Conversation>, ServerError> {
    let friend_id = request.friend_id;
    let conversation = state
        .db
        .call(move |db| {
            if !db.are_friends(user_id, friend_id)? {
                return Err(ServerError::Forbidden("you can only message friends".into()));
            }
            Ok(db.get_or_create_conversation(user_id, friend_id, Utc::now())?)
        })
        .await?;
    Ok(Json(conversation))
}

pub(super) async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<ConversationSummary>>, ServerError> {
    let summaries = state
        .db
        .call(move |db| {
            let mut summaries = Vec::new();
            for conversation in db.conversations_of(user_id)? {
                let other_id = other_participant(&conversation, user_id)?;
                let mut other_user = db.get_user(other_id)?;
                other_user.email = None;
                summaries.push(ConversationSummary {
                    last_message: db.last_message(conversation.id)?,
                    unread_count: db.unread_count(conversation.id, user_id)?,
                    other_user,
                    conversation,
                });
            }
            Ok(summaries)
        })
        .await?;
    Ok(Json(summaries))
}

pub(super) async fn messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE).min(MAX_PAGE);
    let offset = page.offset.unwrap_or(0);
    let messages = state
        .db
        .call(move |db| {
            member_conversation(db, id, user_id)?;
            Ok(db.get_messages(id, limit, offset)?)
        })
        .await?;
    Ok(Json(messages))
}

pub(super) async fn send_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Message>, ServerError> {
    validate_message(&request.content)?;
    let (message, recipient) = state
        .db
        .call(move |db| {
            let conversation = member_conversation(db, id, user_id)?;
            let recipient = other_participant(&conversation, user_id)?;
            let message = db.insert_message(id, user_id, &request.content, Utc::now())?;
            Ok((message, recipient))
        })
        .await?;

    state
        .events
        .publish(
            recipient,
            UserEvent::MessageReceived {
                conversation_id: message.conversation_id,
                message_id: message.id,
            },
        )
        .await;
    Ok(Json(message))
}

pub(super) async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let marked = state
        .db
        .call(move |db| {
            member_conversation(db, id, user_id)?;
            Ok(db.mark_read(id, user_id)?)
        })
        .await?;
    Ok(Json(serde_json::json!({ "marked": marked })))
}

fn member_conversation(db: &Database, id: Uuid, user_id: Uuid) -> Result<Conversation, ServerError> {
    let conversation = db.get_conversation(id)?;
    other_participant(&conversation, user_id)?;
    Ok(conversation)
}

fn other_participant(conversation: &Conversation, user_id: Uuid) -> Result<Uuid, ServerError> {
    if conversation.user_a_id == user_id {
        Ok(conversation.user_b_id)
    } else if conversation.user_b_id == user_id {
        Ok(conversation.user_a_id)
    } else {
        Err(StoreError::NotParticipant.into())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_friends_can_message() {
        let app = test_router();
        let alice = register(&app, "Alice", &["Music"]).await;
        let bob = register(&app, "Bob", &["Music"]).await;
        let (a, b) = (alice.session_token.as_str(), bob.session_token.as_str());

        let (status, _) = send(&app, "POST", "/conversations", Some(a), Some(json!({ "friend_id": bob.user.id }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        send(&app, "POST", "/matchmaking/search", Some(a), Some(json!({}))).await;
        let (_, body) = send(&app, "POST", "/matchmaking/search", Some(b), Some(json!({}))).await;
        let call_id = body["call"]["id"].as_str().unwrap().to_string();
        send(&app, "POST", &format!("/calls/{call_id}/join"), Some(a), None).await;
        send(&app, "POST", &format!("/calls/{call_id}/friend"), Some(a), None).await;
        send(&app, "POST", &format!("/calls/{call_id}/friend"), Some(b), None).await;

        let (status, body) = send(&app, "POST", "/conversations", Some(a), Some(json!({ "friend_id": bob.user.id }))).await;
        assert_eq!(status, StatusCode::OK);
        let conversation_id = body["id"].as_str().unwrap().to_string();
        let messages_uri = format!("/conversations/{conversation_id}/messages");

        let (status, _) = send(&app, "POST", &messages_uri, Some(a), Some(json!({ "content": "   " }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = send(&app, "POST", &messages_uri, Some(a), Some(json!({ "content": "hey!" }))).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, "GET", "/conversations", Some(b), None).await;
        assert_eq!(body[0]["unread_count"], 1);
        assert_eq!(body[0]["last_message"]["content"], "hey!");
        assert_eq!(body[0]["other_user"]["id"], json!(alice.user.id));

        let (_, body) = send(&app, "GET", &messages_uri, Some(b), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send(&app, "POST", &format!("/conversations/{conversation_id}/read"), Some(b), None).await;
        assert_eq!(body["marked"], 1);

        let eve = register(&app, "Eve", &["Art"]).await;
        let (status, _) = send(&app, "GET", &messages_uri, Some(&eve.session_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
