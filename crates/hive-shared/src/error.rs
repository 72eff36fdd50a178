use thiserror::Error;

/// Input rejected before it reaches the network or the database.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Display name is required")]
    DisplayNameRequired,

    #[error("Display name too long: {len} characters (max {max})")]
    DisplayNameTooLong { len: usize, max: usize },

    #[error("Bio too long: {len} characters (max {max})")]
    BioTooLong { len: usize, max: usize },

    #[error("Please select at least one interest")]
    InterestsRequired,

    #[error("Too many interests: {count} (max {max})")]
    TooManyInterests { count: usize, max: usize },

    #[error("Unknown interest: {0}")]
    UnknownInterest(String),

    #[error("Unknown gender option: {0}")]
    UnknownGender(String),

    #[error("Invalid age range {min}-{max}")]
    InvalidAgeRange { min: u8, max: u8 },

    #[error("Invalid date of birth: {0}")]
    InvalidDateOfBirth(String),

    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Text too long: {len} characters (max {max})")]
    TextTooLong { len: usize, max: usize },

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Token signature mismatch")]
    BadSignature,

    #[error("Token expired")]
    Expired,
}
