//! Mini-game state shapes and the rock-paper-scissors round rules.
//!
//! The JSON produced here is what clients render, so field names are
//! camelCase and unset values serialize as `null`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::{
    EMOJI_GUESS_TIME_LIMIT_MS, RPS_MAX_ROUNDS, TRIVIA_TIME_PER_QUESTION_MS, TRIVIA_TOTAL_QUESTIONS,
};
use crate::types::{CallRole, GameType};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameRuleError {
    #[error("Moves are only supported for rock_paper_scissors, not {0}")]
    MovesUnsupported(GameType),

    #[error("Game already has a winner")]
    GameFinished,

    #[error("Invalid choice: {0}")]
    InvalidChoice(String),

    #[error("Corrupt game state: {0}")]
    CorruptState(String),
}

/// Player A is the caller, player B the callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerSlot {
    A,
    B,
}

impl PlayerSlot {
    pub fn from_role(role: CallRole) -> Self {
        match role {
            CallRole::Caller => Self::A,
            CallRole::Callee => Self::B,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Rock-paper-scissors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpsChoice {
    Rock,
    Paper,
    Scissors,
}

impl RpsChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rock => "rock",
            Self::Paper => "paper",
            Self::Scissors => "scissors",
        }
    }

    pub fn parse(s: &str) -> Result<Self, GameRuleError> {
        match s {
            "rock" => Ok(Self::Rock),
            "paper" => Ok(Self::Paper),
            "scissors" => Ok(Self::Scissors),
            other => Err(GameRuleError::InvalidChoice(other.to_string())),
        }
    }

    pub fn beats(&self, other: RpsChoice) -> bool {
        matches!(
            (self, other),
            (Self::Rock, Self::Scissors) | (Self::Paper, Self::Rock) | (Self::Scissors, Self::Paper)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "playerA")]
    PlayerA,
    #[serde(rename = "playerB")]
    PlayerB,
    #[serde(rename = "draw")]
    Draw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpsState {
    pub round: u32,
    pub max_rounds: u32,
    /// Choices of the most recently resolved round.
    pub player_a_choice: Option<RpsChoice>,
    pub player_b_choice: Option<RpsChoice>,
    pub player_a_score: u32,
    pub player_b_score: u32,
    pub current_round_winner: Option<Outcome>,
    pub game_winner: Option<Outcome>,
}

impl Default for RpsState {
    fn default() -> Self {
        Self {
            round: 1,
            max_rounds: RPS_MAX_ROUNDS,
            player_a_choice: None,
            player_b_choice: None,
            player_a_score: 0,
            player_b_score: 0,
            current_round_winner: None,
            game_winner: None,
        }
    }
}

impl RpsState {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, GameRuleError> {
        serde_json::from_value(value.clone()).map_err(|e| GameRuleError::CorruptState(e.to_string()))
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        self.game_winner.is_some()
    }

    /// Reveal both choices of the current round, score it, and either
    /// advance to the next round or declare the game winner.
    pub fn resolve_round(&mut self, a: RpsChoice, b: RpsChoice) -> Result<Outcome, GameRuleError> {
        if self.is_finished() {
            return Err(GameRuleError::GameFinished);
        }

        let outcome = if a.beats(b) {
            self.player_a_score += 1;
            Outcome::PlayerA
        } else if b.beats(a) {
            self.player_b_score += 1;
            Outcome::PlayerB
        } else {
            Outcome::Draw
        };

        self.player_a_choice = Some(a);
        self.player_b_choice = Some(b);
        self.current_round_winner = Some(outcome);

        if self.round >= self.max_rounds {
            self.game_winner = Some(match self.player_a_score.cmp(&self.player_b_score) {
                std::cmp::Ordering::Greater => Outcome::PlayerA,
                std::cmp::Ordering::Less => Outcome::PlayerB,
                std::cmp::Ordering::Equal => Outcome::Draw,
            });
        } else {
            self.round += 1;
        }

        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Trivia / emoji guess
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriviaState {
    pub current_question: u32,
    pub total_questions: u32,
    pub player_a_score: u32,
    pub player_b_score: u32,
    pub player_a_answers: Vec<serde_json::Value>,
    pub player_b_answers: Vec<serde_json::Value>,
    pub question_start_time: Option<i64>,
    pub time_per_question: u64,
}

impl Default for TriviaState {
    fn default() -> Self {
        Self {
            current_question: 0,
            total_questions: TRIVIA_TOTAL_QUESTIONS,
            player_a_score: 0,
            player_b_score: 0,
            player_a_answers: Vec::new(),
            player_b_answers: Vec::new(),
            question_start_time: None,
            time_per_question: TRIVIA_TIME_PER_QUESTION_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmojiGuessState {
    pub current_word: String,
    pub emojis: Vec<String>,
    pub guesser_guess: String,
    pub host_id: Option<Uuid>,
    pub guesser_id: Option<Uuid>,
    pub time_limit: u64,
    pub start_time: Option<i64>,
    pub is_correct: bool,
}

impl Default for EmojiGuessState {
    fn default() -> Self {
        Self {
            current_word: String::new(),
            emojis: Vec::new(),
            guesser_guess: String::new(),
            host_id: None,
            guesser_id: None,
            time_limit: EMOJI_GUESS_TIME_LIMIT_MS,
            start_time: None,
            is_correct: false,
        }
    }
}

/// A word to be guessed from its emoji rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmojiPuzzle {
    pub emojis: &'static str,
    pub answer: &'static str,
    pub hint: &'static str,
}

pub const EMOJI_PUZZLES: &[EmojiPuzzle] = &[
    EmojiPuzzle { emojis: "🍕🏠", answer: "Pizza Hut", hint: "Fast food restaurant" },
    EmojiPuzzle { emojis: "⭐💰", answer: "Starbucks", hint: "Coffee chain" },
    EmojiPuzzle { emojis: "🐦📱", answer: "Twitter", hint: "Social media platform" },
    EmojiPuzzle { emojis: "🎬🌟", answer: "Movie Star", hint: "Hollywood celebrity" },
    EmojiPuzzle { emojis: "🎓📚", answer: "Study", hint: "What students do" },
];

pub fn random_emoji_puzzle() -> EmojiPuzzle {
    use rand::seq::SliceRandom;
    EMOJI_PUZZLES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(EMOJI_PUZZLES[0])
}

impl EmojiGuessState {
    /// Start a round hosted by `host` with `guesser` trying to guess.
    pub fn with_puzzle(puzzle: EmojiPuzzle, host: Uuid, guesser: Uuid, now_ms: i64) -> Self {
        Self {
            current_word: puzzle.answer.to_string(),
            emojis: puzzle.emojis.chars().map(|c| c.to_string()).collect(),
            host_id: Some(host),
            guesser_id: Some(guesser),
            start_time: Some(now_ms),
            ..Self::default()
        }
    }

    pub fn guess(&mut self, guess: &str) -> bool {
        self.guesser_guess = guess.to_string();
        self.is_correct = guess.trim().eq_ignore_ascii_case(&self.current_word);
        self.is_correct
    }
}

/// The state blob a new session of `game_type` starts with.
pub fn initial_state(game_type: GameType) -> serde_json::Value {
    let value = match game_type {
        GameType::RockPaperScissors => serde_json::to_value(RpsState::default()),
        GameType::Trivia => serde_json::to_value(TriviaState::default()),
        GameType::EmojiGuess => serde_json::to_value(EmojiGuessState::default()),
    };
    value.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rps_initial_shape() {
        assert_eq!(
            initial_state(GameType::RockPaperScissors),
            json!({
                "round": 1,
                "maxRounds": 3,
                "playerAChoice": null,
                "playerBChoice": null,
                "playerAScore": 0,
                "playerBScore": 0,
                "currentRoundWinner": null,
                "gameWinner": null,
            })
        );
    }

    #[test]
    fn test_trivia_and_emoji_initial_shapes() {
        let trivia = initial_state(GameType::Trivia);
        assert_eq!(trivia["totalQuestions"], 3);
        assert_eq!(trivia["timePerQuestion"], 10000);
        assert_eq!(trivia["playerAAnswers"], json!([]));

        let emoji = initial_state(GameType::EmojiGuess);
        assert_eq!(emoji["currentWord"], "");
        assert_eq!(emoji["timeLimit"], 30000);
        assert_eq!(emoji["hostId"], serde_json::Value::Null);
    }

    #[test]
    fn test_rps_three_rounds() {
        let mut state = RpsState::default();
        assert_eq!(
            state.resolve_round(RpsChoice::Rock, RpsChoice::Scissors).unwrap(),
            Outcome::PlayerA
        );
        assert_eq!(state.round, 2);
        assert_eq!(
            state.resolve_round(RpsChoice::Rock, RpsChoice::Rock).unwrap(),
            Outcome::Draw
        );
        assert_eq!(
            state.resolve_round(RpsChoice::Rock, RpsChoice::Paper).unwrap(),
            Outcome::PlayerB
        );

        assert_eq!(state.round, 3);
        assert_eq!((state.player_a_score, state.player_b_score), (1, 1));
        assert_eq!(state.game_winner, Some(Outcome::Draw));
        assert_eq!(
            state.resolve_round(RpsChoice::Rock, RpsChoice::Paper),
            Err(GameRuleError::GameFinished)
        );
    }

    #[test]
    fn test_emoji_guess_is_case_insensitive() {
        let (host, guesser) = (Uuid::new_v4(), Uuid::new_v4());
        let mut state = EmojiGuessState::with_puzzle(EMOJI_PUZZLES[1], host, guesser, 0);
        assert_eq!(state.emojis, vec!["⭐", "💰"]);
        assert!(!state.guess("coffee"));
        assert!(state.guess(" starbucks "));
        assert!(state.is_correct);
    }

    #[test]
    fn test_choice_parsing() {
        assert_eq!(RpsChoice::parse("paper").unwrap(), RpsChoice::Paper);
        assert!(RpsChoice::parse("lizard").is_err());
        assert!(RpsChoice::Scissors.beats(RpsChoice::Paper));
        assert!(!RpsChoice::Scissors.beats(RpsChoice::Rock));
    }
}
