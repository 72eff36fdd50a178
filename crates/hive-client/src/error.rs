use hive_shared::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not signed in")]
    AuthRequired,

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("No active call")]
    NoActiveCall,

    #[error("No active game")]
    NoActiveGame,

    #[error("Invalid game state: {0}")]
    GameState(String),
}

impl ClientError {
    /// The request reached the server and was rejected with `status`.
    pub fn is_status(&self, status: u16) -> bool {
        matches!(self, ClientError::Api { status: s, .. } if *s == status)
    }

    /// Failures worth retrying: the server was unreachable or broke, as
    /// opposed to rejecting the request.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let api = |status| ClientError::Api {
            status,
            message: String::new(),
        };
        assert!(api(500).is_transient());
        assert!(api(429).is_transient());
        assert!(!api(409).is_transient());
        assert!(!ClientError::AuthRequired.is_transient());
        assert!(api(409).is_status(409));
    }
}
