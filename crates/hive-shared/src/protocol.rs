//! Request and response bodies of the HTTP API, plus the push events
//! delivered through the long-poll endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{GENDER_ANY, GENDER_OPTIONS};
use crate::error::ValidationError;
use crate::filters::SearchFilters;
use crate::games::Outcome;
use crate::models::{Call, Conversation, Friendship, GameSession, Message, User};
use crate::types::{GameType, MediaEvent, ReportReason};
use crate::validation::{
    parse_date_of_birth, validate_bio, validate_display_name, validate_profile_interests,
};

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub display_name: String,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub gender: Option<String>,
    pub pronouns: Option<String>,
    /// `YYYY-MM-DD`
    pub date_of_birth: Option<String>,
}

/// A validated profile ready to be inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProfile {
    pub email: Option<String>,
    pub display_name: String,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub gender: Option<String>,
    pub pronouns: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<NewProfile, ValidationError> {
        let display_name = validate_display_name(&self.display_name)?;
        validate_profile_interests(&self.interests)?;
        Ok(NewProfile {
            email: self.email.clone(),
            display_name,
            bio: self.bio.as_deref().map(validate_bio).transpose()?,
            interests: self.interests.clone(),
            gender: self.gender.as_deref().map(validate_gender).transpose()?,
            pronouns: self.pronouns.clone(),
            date_of_birth: self
                .date_of_birth
                .as_deref()
                .map(parse_date_of_birth)
                .transpose()?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdateRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub interests: Option<Vec<String>>,
    pub gender: Option<String>,
    pub pronouns: Option<String>,
    pub date_of_birth: Option<String>,
}

/// A validated partial profile edit. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub interests: Option<Vec<String>>,
    pub gender: Option<String>,
    pub pronouns: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl ProfileUpdateRequest {
    pub fn validate(&self) -> Result<ProfileUpdate, ValidationError> {
        if let Some(interests) = &self.interests {
            validate_profile_interests(interests)?;
        }
        Ok(ProfileUpdate {
            display_name: self
                .display_name
                .as_deref()
                .map(validate_display_name)
                .transpose()?,
            bio: self.bio.as_deref().map(validate_bio).transpose()?,
            interests: self.interests.clone(),
            gender: self.gender.as_deref().map(validate_gender).transpose()?,
            pronouns: self.pronouns.clone(),
            date_of_birth: self
                .date_of_birth
                .as_deref()
                .map(parse_date_of_birth)
                .transpose()?,
        })
    }
}

/// Profile genders are the filter options without the `All` wildcard.
fn validate_gender(gender: &str) -> Result<String, ValidationError> {
    if gender != GENDER_ANY && GENDER_OPTIONS.contains(&gender) {
        Ok(gender.to_string())
    } else {
        Err(ValidationError::UnknownGender(gender.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: User,
    pub session_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRequest {
    pub online: bool,
}

// ---------------------------------------------------------------------------
// Matchmaking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartSearchRequest {
    #[serde(default)]
    pub filters: SearchFilters,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchStarted {
    pub searching: bool,
    /// Set when this enqueue immediately claimed a waiting partner.
    pub call: Option<Call>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchStopped {
    pub searching: bool,
    /// A `waiting` call that raced with the cancellation and was canceled.
    pub canceled_call: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchStatus {
    pub queued: bool,
    pub call: Option<Call>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WaitOutcome {
    Matched { call: Call },
    Canceled { call_id: Uuid },
    Pending,
    NotSearching,
}

/// Server-pushed notifications. Receivers treat them as "something changed,
/// re-sync"; payloads are a convenience.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserEvent {
    MatchFound { call: Call },
    CallCanceled { call_id: Uuid },
    CallUpdated { call: Call },
    FriendshipFormed { friendship: Friendship },
    MessageReceived { conversation_id: Uuid, message_id: Uuid },
    GameUpdated { session: GameSession },
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinedCall {
    pub call: Call,
    pub counterpart: User,
    pub channel_name: String,
    pub media_app_id: String,
    pub media_token: String,
    pub friend_pressed: bool,
    pub other_friend_pressed: bool,
    pub icebreaker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendPressOutcome {
    pub call: Call,
    /// This participant had already pressed; nothing was written.
    pub already_pressed: bool,
    /// Present once both participants have pressed.
    pub friendship: Option<Friendship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub reason: ReportReason,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRequest {
    pub rating: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaEventRequest {
    pub event: MediaEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IcebreakerResponse {
    pub prompt: String,
}

// ---------------------------------------------------------------------------
// Social
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendEntry {
    pub friendship: Friendship,
    pub friend: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConversationRequest {
    pub friend_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub other_user: User,
    pub last_message: Option<Message>,
    pub unread_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

// ---------------------------------------------------------------------------
// Mini-games
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartGameRequest {
    pub game_type: GameType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateGameStateRequest {
    pub state: serde_json::Value,
    /// If set, the write only succeeds when the stored version matches.
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitMoveRequest {
    pub choice: String,
}

/// A sealed move was stored. The opponent's choice stays hidden until
/// `resolved` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveAccepted {
    pub session: GameSession,
    pub round: u32,
    pub resolved: Option<Outcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndGameRequest {
    pub result: serde_json::Value,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_validation() {
        let request = RegisterRequest {
            display_name: "  Mia ".into(),
            interests: vec!["Music".into()],
            gender: Some("Female".into()),
            date_of_birth: Some("2001-02-03".into()),
            ..Default::default()
        };
        let profile = request.validate().unwrap();
        assert_eq!(profile.display_name, "Mia");
        assert_eq!(profile.date_of_birth, NaiveDate::from_ymd_opt(2001, 2, 3));

        let wildcard = RegisterRequest {
            gender: Some("All".into()),
            ..request.clone()
        };
        assert!(wildcard.validate().is_err());

        let no_interests = RegisterRequest {
            interests: vec![],
            ..request
        };
        assert_eq!(
            no_interests.validate(),
            Err(ValidationError::InterestsRequired)
        );
    }

    #[test]
    fn test_wait_outcome_tagging() {
        let json = serde_json::to_value(WaitOutcome::Pending).unwrap();
        assert_eq!(json, serde_json::json!({ "outcome": "pending" }));
    }
}
