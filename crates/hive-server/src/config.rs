//! Environment-driven server settings. Every variable is optional; unset or
//! unparsable values keep the development default and log a warning.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct ServerConfig {
    /// HTTP listen address.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./hive.db`
    pub database_path: PathBuf,

    /// Reported by `GET /health`.
    /// Env: `INSTANCE_NAME`
    /// Default: `"VideoHive"`
    pub instance_name: String,

    /// Root secret for session and media tokens (hex-encoded, 64 chars).
    /// Env: `TOKEN_SECRET`
    /// Default: all-zeros (development only).
    pub token_secret: [u8; 32],

    /// Session token lifetime.
    /// Env: `SESSION_TTL_SECS`
    /// Default: 30 days
    pub session_ttl: Duration,

    /// Media token lifetime.
    /// Env: `MEDIA_TOKEN_TTL_SECS`
    /// Default: 1 hour
    pub media_token_ttl: Duration,

    /// Application identifier handed to the video transport.
    /// Env: `MEDIA_APP_ID`
    /// Default: `"hive-dev"`
    pub media_app_id: String,

    /// Longest a single match/event long-poll may block.
    /// Env: `MATCH_WAIT_MAX_SECS`
    /// Default: 30 s
    pub match_wait_max: Duration,

    /// When set, a call only becomes `connected` after both sides joined.
    /// Env: `REQUIRE_BOTH_JOINED` (true/false)
    /// Default: `false`
    pub require_both_joined: bool,

    /// Optional external icebreaker generator.
    /// Env: `PROMPT_API_URL`
    /// Default: unset (static prompts only).
    pub prompt_api_url: Option<String>,

    /// Timeout for the icebreaker generator.
    /// Env: `PROMPT_TIMEOUT_MS`
    /// Default: 1500 ms
    pub prompt_timeout: Duration,

    /// Per-IP token bucket.
    /// Env: `RATE_LIMIT_RPS`, `RATE_LIMIT_BURST`
    /// Default: 10 req/s sustained, burst of 30
    pub rate_limit_rps: f64,
    pub rate_limit_burst: f64,

    /// Per-user token bucket on starting a search.
    /// Env: `SEARCH_RATE_PER_SEC`, `SEARCH_BURST`
    /// Default: one search every two seconds, burst of 5
    pub search_rate_per_sec: f64,
    pub search_burst: f64,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("instance_name", &self.instance_name)
            .field("session_ttl", &self.session_ttl)
            .field("media_token_ttl", &self.media_token_ttl)
            .field("media_app_id", &self.media_app_id)
            .field("match_wait_max", &self.match_wait_max)
            .field("require_both_joined", &self.require_both_joined)
            .field("prompt_api_url", &self.prompt_api_url)
            .field("prompt_timeout", &self.prompt_timeout)
            .field("rate_limit_rps", &self.rate_limit_rps)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .field("search_rate_per_sec", &self.search_rate_per_sec)
            .field("search_burst", &self.search_burst)
            .finish_non_exhaustive()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: PathBuf::from("./hive.db"),
            instance_name: "VideoHive".to_string(),
            token_secret: [0u8; 32],
            session_ttl: Duration::from_secs(30 * 24 * 3600),
            media_token_ttl: Duration::from_secs(3600),
            media_app_id: "hive-dev".to_string(),
            match_wait_max: Duration::from_secs(30),
            require_both_joined: false,
            prompt_api_url: None,
            prompt_timeout: Duration::from_millis(1500),
            rate_limit_rps: 10.0,
            rate_limit_burst: 30.0,
            search_rate_per_sec: 0.5,
            search_burst: 5.0,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            parse_into(&mut config.http_addr, "HTTP_ADDR", &addr);
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        match lookup("TOKEN_SECRET") {
            Some(hex_key) => match parse_secret(&hex_key) {
                Ok(key) => config.token_secret = key,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid TOKEN_SECRET, using default (dev-only)"
                    );
                }
            },
            None => tracing::warn!("TOKEN_SECRET not set, using all-zero secret (dev-only)"),
        }

        if let Some(val) = lookup("SESSION_TTL_SECS") {
            parse_secs(&mut config.session_ttl, "SESSION_TTL_SECS", &val);
        }

        if let Some(val) = lookup("MEDIA_TOKEN_TTL_SECS") {
            parse_secs(&mut config.media_token_ttl, "MEDIA_TOKEN_TTL_SECS", &val);
        }

        if let Some(app_id) = lookup("MEDIA_APP_ID") {
            config.media_app_id = app_id;
        }

        if let Some(val) = lookup("MATCH_WAIT_MAX_SECS") {
            parse_secs(&mut config.match_wait_max, "MATCH_WAIT_MAX_SECS", &val);
        }

        if let Some(val) = lookup("REQUIRE_BOTH_JOINED") {
            config.require_both_joined = val == "true" || val == "1";
        }

        if let Some(url) = lookup("PROMPT_API_URL") {
            if !url.is_empty() {
                config.prompt_api_url = Some(url);
            }
        }

        if let Some(val) = lookup("PROMPT_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.prompt_timeout = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %val, "Invalid PROMPT_TIMEOUT_MS, using default"),
            }
        }

        if let Some(val) = lookup("RATE_LIMIT_RPS") {
            parse_into(&mut config.rate_limit_rps, "RATE_LIMIT_RPS", &val);
        }
        if let Some(val) = lookup("RATE_LIMIT_BURST") {
            parse_into(&mut config.rate_limit_burst, "RATE_LIMIT_BURST", &val);
        }
        if let Some(val) = lookup("SEARCH_RATE_PER_SEC") {
            parse_into(&mut config.search_rate_per_sec, "SEARCH_RATE_PER_SEC", &val);
        }
        if let Some(val) = lookup("SEARCH_BURST") {
            parse_into(&mut config.search_burst, "SEARCH_BURST", &val);
        }

        config
    }
}

fn parse_into<T: FromStr>(slot: &mut T, name: &str, value: &str) {
    match value.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => tracing::warn!(value = %value, "Invalid {name}, using default"),
    }
}

fn parse_secs(slot: &mut Duration, name: &str, value: &str) {
    let mut secs = slot.as_secs();
    parse_into(&mut secs, name, value);
    *slot = Duration::from_secs(secs);
}

/// 32 secret bytes written as 64 hex digits.
fn parse_secret(value: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(value.trim()).map_err(|e| e.to_string())?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| format!("expected 32 bytes, got {}", bytes.len()))
}
