use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the VideoHive server, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,

    /// How long a single match long poll may block.
    /// Default: 20 s
    pub wait_timeout: Duration,

    /// Overall budget for one search before giving up.
    /// Default: 5 min
    pub search_timeout: Duration,

    /// First retry delay after a transport failure; doubles per failure.
    /// Default: 1 s
    pub backoff_base: Duration,

    /// Retry delay ceiling.
    /// Default: 30 s
    pub backoff_max: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            wait_timeout: Duration::from_secs(20),
            search_timeout: Duration::from_secs(300),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// The retry delay after `failures` consecutive failures (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.backoff_base
            .checked_mul(factor)
            .map_or(self.backoff_max, |delay| delay.min(self.backoff_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_to_ceiling() {
        let config = ClientConfig::default();
        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
        assert_eq!(config.backoff(5), Duration::from_secs(16));
        assert_eq!(config.backoff(6), Duration::from_secs(30));
        assert_eq!(config.backoff(64), Duration::from_secs(30));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        assert_eq!(ClientConfig::new("http://hive.local/").base_url, "http://hive.local");
    }
}
