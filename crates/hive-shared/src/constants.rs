/// Application name
pub const APP_NAME: &str = "VideoHive";

/// Prefix of every generated call channel name
pub const CHANNEL_PREFIX: &str = "call_";

/// Length of the random base36 suffix of a channel name
pub const CHANNEL_SUFFIX_LEN: usize = 9;

/// Interests a user can pick from (profile and search filters)
pub const INTEREST_CATALOG: &[&str] = &[
    "Music",
    "Gaming",
    "Movies",
    "Sports",
    "Art",
    "Travel",
    "Food",
    "Books",
    "Technology",
    "Photography",
];

/// Gender filter options. `All` disables the gender filter.
pub const GENDER_OPTIONS: &[&str] = &["Male", "Female", "Non-binary", "All"];

/// Wildcard gender filter value
pub const GENDER_ANY: &str = "All";

/// Youngest age a search filter may ask for
pub const MIN_AGE: u8 = 18;

/// Oldest age a search filter may ask for
pub const MAX_AGE: u8 = 100;

/// Maximum number of interests in one search filter
pub const MAX_FILTER_INTERESTS: usize = INTEREST_CATALOG.len();

/// Maximum number of interests on a profile
pub const MAX_PROFILE_INTERESTS: usize = 3;

/// Maximum display name length in characters
pub const MAX_DISPLAY_NAME_LEN: usize = 50;

/// Maximum bio length in characters
pub const MAX_BIO_LEN: usize = 150;

/// Maximum chat message length in characters
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Maximum report description length in characters
pub const MAX_REPORT_DESCRIPTION_LEN: usize = 1000;

/// Rock-paper-scissors rounds per game
pub const RPS_MAX_ROUNDS: u32 = 3;

/// Trivia questions per game
pub const TRIVIA_TOTAL_QUESTIONS: u32 = 3;

/// Time allowed per trivia question in milliseconds
pub const TRIVIA_TIME_PER_QUESTION_MS: u64 = 10_000;

/// Time allowed per emoji-guess round in milliseconds
pub const EMOJI_GUESS_TIME_LIMIT_MS: u64 = 30_000;

/// Default number of trivia questions returned by the pool endpoint
pub const DEFAULT_TRIVIA_POOL: u32 = 50;

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_SESSION_TOKEN: &str = "videohive-session-token-v1";
pub const KDF_CONTEXT_MEDIA_TOKEN: &str = "videohive-media-token-v1";
