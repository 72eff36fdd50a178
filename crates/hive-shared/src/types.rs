use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{CHANNEL_PREFIX, CHANNEL_SUFFIX_LEN};
use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Call status
// ---------------------------------------------------------------------------

/// Lifecycle of a shared call record.
///
/// `waiting → connecting → connected → {ended | reported | canceled}`.
/// A `waiting` call may also go straight to `connected` (single-side join)
/// or to `canceled` (search cancelled before anyone joined).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Waiting,
    Connecting,
    Connected,
    Ended,
    Reported,
    Canceled,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Ended => "ended",
            Self::Reported => "reported",
            Self::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Reported | Self::Canceled)
    }

    /// Whether the status is past matching and was not canceled. Ended and
    /// reported calls count even if nobody joined; check the join flags too.
    pub fn has_started(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::Ended | Self::Reported
        )
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            "ended" => Ok(Self::Ended),
            "reported" => Ok(Self::Reported),
            "canceled" => Ok(Self::Canceled),
            other => Err(ValidationError::InvalidValue {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Which side of a call a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallRole {
    Caller,
    Callee,
}

impl CallRole {
    pub fn other(&self) -> Self {
        match self {
            Self::Caller => Self::Callee,
            Self::Callee => Self::Caller,
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    InappropriateBehavior,
    Harassment,
    Spam,
    FakeProfile,
    Underage,
    Other,
}

impl ReportReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InappropriateBehavior => "inappropriate_behavior",
            Self::Harassment => "harassment",
            Self::Spam => "spam",
            Self::FakeProfile => "fake_profile",
            Self::Underage => "underage",
            Self::Other => "other",
        }
    }
}

impl FromStr for ReportReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inappropriate_behavior" => Ok(Self::InappropriateBehavior),
            "harassment" => Ok(Self::Harassment),
            "spam" => Ok(Self::Spam),
            "fake_profile" => Ok(Self::FakeProfile),
            "underage" => Ok(Self::Underage),
            "other" => Ok(Self::Other),
            other => Err(ValidationError::InvalidValue {
                field: "reason",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Mini-games
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    RockPaperScissors,
    Trivia,
    EmojiGuess,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RockPaperScissors => "rock_paper_scissors",
            Self::Trivia => "trivia",
            Self::EmojiGuess => "emoji_guess",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rock_paper_scissors" => Ok(Self::RockPaperScissors),
            "trivia" => Ok(Self::Trivia),
            "emoji_guess" => Ok(Self::EmojiGuess),
            other => Err(ValidationError::InvalidValue {
                field: "game_type",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Media transport callbacks
// ---------------------------------------------------------------------------

/// Callbacks raised by the embedded video transport, forwarded by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEvent {
    PeerJoined,
    PeerLeft,
    Error,
}

/// Generate a channel name of the form `call_<unix millis>_<9 base36 chars>`.
///
/// Unique enough for this scale; collisions are rejected by the `calls`
/// table's unique constraint.
pub fn generate_channel_name() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CHANNEL_SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!(
        "{}{}_{}",
        CHANNEL_PREFIX,
        chrono::Utc::now().timestamp_millis(),
        suffix
    )
}
