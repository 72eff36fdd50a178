//! Domain records persisted by `hive-store` and exchanged over the API.
//!
//! Every struct derives `Serialize` and `Deserialize` so the server can hand
//! rows straight to clients.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filters::{CandidateProfile, SearchFilters};
use crate::games::PlayerSlot;
use crate::types::{CallRole, CallStatus, GameType, ReportReason};
use crate::validation::age_on;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered user profile. Edited by its owner; `is_online` and
/// `last_seen` are maintained by the system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: String,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub gender: Option<String>,
    pub pronouns: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub selfie_verified: bool,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The attributes search filters are evaluated against.
    pub fn candidate_profile(&self, today: NaiveDate) -> CandidateProfile {
        CandidateProfile {
            gender: self.gender.clone(),
            age: self.date_of_birth.map(|dob| age_on(dob, today)),
        }
    }
}

// ---------------------------------------------------------------------------
// Matchmaking queue
// ---------------------------------------------------------------------------

/// A live search. At most one per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueEntry {
    /// Monotonic insertion order; pairing is first-in first-out.
    pub seq: i64,
    pub user_id: Uuid,
    pub preferences: SearchFilters,
    pub enqueued_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

/// A shared call record between two matched users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Call {
    pub id: Uuid,
    /// Channel identifier handed to the video transport.
    pub channel_name: String,
    pub caller_id: Uuid,
    pub callee_id: Uuid,
    pub status: CallStatus,
    pub caller_joined: bool,
    pub callee_joined: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub friend_press_caller: bool,
    pub friend_press_callee: bool,
    pub caller_rating: Option<u8>,
    pub callee_rating: Option<u8>,
    pub created_at: DateTime<Utc>,
}

impl Call {
    pub fn role_of(&self, user_id: Uuid) -> Option<CallRole> {
        if user_id == self.caller_id {
            Some(CallRole::Caller)
        } else if user_id == self.callee_id {
            Some(CallRole::Callee)
        } else {
            None
        }
    }

    pub fn participant(&self, role: CallRole) -> Uuid {
        match role {
            CallRole::Caller => self.caller_id,
            CallRole::Callee => self.callee_id,
        }
    }

    pub fn counterpart_of(&self, user_id: Uuid) -> Option<Uuid> {
        self.role_of(user_id).map(|role| self.participant(role.other()))
    }

    pub fn friend_pressed(&self, role: CallRole) -> bool {
        match role {
            CallRole::Caller => self.friend_press_caller,
            CallRole::Callee => self.friend_press_callee,
        }
    }

    pub fn joined(&self, role: CallRole) -> bool {
        match role {
            CallRole::Caller => self.caller_joined,
            CallRole::Callee => self.callee_joined,
        }
    }
}

// ---------------------------------------------------------------------------
// Friendship
// ---------------------------------------------------------------------------

/// Undirected friendship. Stored with `user_a_id < user_b_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Friendship {
    pub id: Uuid,
    pub user_a_id: Uuid,
    pub user_b_id: Uuid,
    /// The call on which both participants pressed "friend".
    pub call_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Friendship {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.user_a_id == user_id || self.user_b_id == user_id
    }

    pub fn other_of(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.user_a_id {
            Some(self.user_b_id)
        } else if user_id == self.user_b_id {
            Some(self.user_a_id)
        } else {
            None
        }
    }
}

/// Order a pair of user ids the way friendships and conversations store them.
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub reported_user_id: Uuid,
    pub call_id: Option<Uuid>,
    pub reason: ReportReason,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

/// 1:1 conversation, created lazily the first time two friends talk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub user_a_id: Uuid,
    pub user_b_id: Uuid,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Mini-games
// ---------------------------------------------------------------------------

/// A mini-game played inside a call. Active while `ended_at` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSession {
    pub id: Uuid,
    pub call_id: Uuid,
    pub game_type: GameType,
    /// Game-type specific state blob, replaced wholesale on every write.
    pub game_state: serde_json::Value,
    pub game_result: Option<serde_json::Value>,
    /// Bumped on every state write; used for compare-and-swap updates.
    pub version: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GameSession {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// A sealed move. Never exposed to the opponent before the round resolves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameMove {
    pub session_id: Uuid,
    pub round: u32,
    pub player: PlayerSlot,
    pub choice: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriviaQuestion {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub category: String,
    pub difficulty: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(caller: Uuid, callee: Uuid) -> Call {
        let now = Utc::now();
        Call {
            id: Uuid::new_v4(),
            channel_name: "call_1_abc".into(),
            caller_id: caller,
            callee_id: callee,
            status: CallStatus::Waiting,
            caller_joined: false,
            callee_joined: false,
            started_at: now,
            ended_at: None,
            duration_seconds: 0,
            friend_press_caller: true,
            friend_press_callee: false,
            caller_rating: None,
            callee_rating: None,
            created_at: now,
        }
    }

    #[test]
    fn test_call_roles() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let c = call(a, b);
        assert_eq!(c.role_of(a), Some(CallRole::Caller));
        assert_eq!(c.role_of(b), Some(CallRole::Callee));
        assert_eq!(c.role_of(Uuid::new_v4()), None);
        assert_eq!(c.counterpart_of(b), Some(a));
        assert!(c.friend_pressed(CallRole::Caller));
        assert!(!c.friend_pressed(CallRole::Callee));
    }

    #[test]
    fn test_canonical_pair_is_order_independent() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(canonical_pair(a, b), canonical_pair(b, a));
        let (lo, hi) = canonical_pair(a, b);
        assert!(lo <= hi);
    }
}
