//! Conversation starters for a freshly joined call.
//!
//! An external generator is tried first when configured; any failure or
//! timeout falls back to the built-in prompts.

use std::time::Duration;

use hive_shared::prompts::fallback_icebreaker;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    user_a_interests: &'a [String],
    user_b_interests: &'a [String],
    context: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    icebreakers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IcebreakerService {
    client: reqwest::Client,
    endpoint: Option<String>,
    timeout: Duration,
}

impl IcebreakerService {
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
        }
    }

    /// Static prompts only.
    pub fn offline() -> Self {
        Self::new(None, Duration::from_millis(0))
    }

    /// A prompt for two users; `seed` keys the fallback pick.
    pub async fn generate(&self, a_interests: &[String], b_interests: &[String], seed: &str) -> String {
        if let Some(endpoint) = &self.endpoint {
            match self.remote(endpoint, a_interests, b_interests).await {
                Ok(Some(prompt)) => return prompt,
                Ok(None) => warn!("icebreaker generator returned no prompts, using fallback"),
                Err(e) => warn!(error = %e, "icebreaker generator failed, using fallback"),
            }
        }
        fallback_icebreaker(a_interests, b_interests, seed)
    }

    async fn remote(
        &self,
        endpoint: &str,
        a_interests: &[String],
        b_interests: &[String],
    ) -> Result<Option<String>, reqwest::Error> {
        let body = GenerateRequest {
            user_a_interests: a_interests,
            user_b_interests: b_interests,
            context: "video_call",
        };

        let response: GenerateResponse = self
            .client
            .post(endpoint)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(count = response.icebreakers.len(), "icebreakers generated");
        Ok(response
            .icebreakers
            .into_iter()
            .map(|p| p.trim().to_string())
            .find(|p| !p.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn spawn_generator(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}/icebreakers")
    }

    #[tokio::test]
    async fn test_offline_uses_shared_interest() {
        let service = IcebreakerService::offline();
        let prompt = service
            .generate(&list(&["Music"]), &list(&["Music", "Art"]), "seed")
            .await;
        assert_eq!(prompt, "I see we both like Music! What got you into it?");
    }

    #[tokio::test]
    async fn test_remote_prompt_is_used() {
        let router = Router::new().route(
            "/icebreakers",
            post(|| async { Json(serde_json::json!({ "icebreakers": ["  ", "Best trip ever?"] })) }),
        );
        let endpoint = spawn_generator(router).await;
        let service = IcebreakerService::new(Some(endpoint), Duration::from_secs(2));

        let prompt = service.generate(&list(&["Art"]), &list(&["Music"]), "seed").await;
        assert_eq!(prompt, "Best trip ever?");
    }

    #[tokio::test]
    async fn test_slow_generator_falls_back() {
        let router = Router::new().route(
            "/icebreakers",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(serde_json::json!({ "icebreakers": ["too late"] }))
            }),
        );
        let endpoint = spawn_generator(router).await;
        let service = IcebreakerService::new(Some(endpoint), Duration::from_millis(50));

        let a = list(&["Art"]);
        let b = list(&["Music"]);
        let prompt = service.generate(&a, &b, "seed").await;
        assert_eq!(prompt, fallback_icebreaker(&a, &b, "seed"));
    }
}
