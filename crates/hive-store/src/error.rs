use hive_shared::games::GameRuleError;
use hive_shared::CallStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Creating the database directory failed.
    #[error("database directory: {0}")]
    Io(#[from] std::io::Error),

    /// The addressed row does not exist.
    #[error("not found")]
    NotFound,

    #[error("schema migration failed: {0}")]
    Migration(String),

    /// A stored id column did not hold a UUID.
    #[error("malformed id column: {0}")]
    Uuid(#[from] uuid::Error),

    /// A stored timestamp column was not RFC 3339.
    #[error("malformed timestamp column: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// A JSON column (filters, interests, game state) failed to encode or decode.
    #[error("malformed JSON column: {0}")]
    Json(#[from] serde_json::Error),

    /// The acting user is neither caller nor callee of the call.
    #[error("User is not a participant of this call")]
    NotParticipant,

    /// The call's current status does not allow the requested action.
    #[error("Cannot {action} a call that is {from}")]
    InvalidTransition {
        from: CallStatus,
        action: &'static str,
    },

    /// A uniqueness or version precondition failed.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The game session has already ended.
    #[error("Game session has ended")]
    GameEnded,

    /// A move was rejected by the game rules.
    #[error(transparent)]
    Rules(#[from] GameRuleError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Map "no rows" onto [`StoreError::NotFound`].
pub(crate) fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Whether `e` is a UNIQUE / CHECK / FK constraint violation.
pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
