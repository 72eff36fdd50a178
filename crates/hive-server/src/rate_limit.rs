//! Token-bucket admission, keyed by client IP for every request and by user
//! id for matchmaking searches.

use std::collections::HashMap;
use std::hash::Hash;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::error::ServerError;

/// Refill rate and burst size of one bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    pub per_second: f64,
    pub burst: f64,
}

#[derive(Debug)]
struct Bucket {
    available: f64,
    touched: Instant,
}

impl Bucket {
    fn full(quota: Quota, now: Instant) -> Self {
        Self {
            available: quota.burst,
            touched: now,
        }
    }

    /// Credit the time since the last request, then spend one token.
    fn admit(&mut self, quota: Quota, now: Instant) -> bool {
        let idle = now.saturating_duration_since(self.touched).as_secs_f64();
        self.available = quota.burst.min(self.available + idle * quota.per_second);
        self.touched = now;

        let admitted = self.available >= 1.0;
        if admitted {
            self.available -= 1.0;
        }
        admitted
    }
}

#[derive(Clone)]
pub struct RateLimiter<K = IpAddr> {
    quota: Quota,
    buckets: Arc<Mutex<HashMap<K, Bucket>>>,
}

pub type SearchLimiter = RateLimiter<Uuid>;

impl<K: Eq + Hash> RateLimiter<K> {
    pub fn new(per_second: f64, burst: f64) -> Self {
        Self {
            quota: Quota { per_second, burst },
            buckets: Arc::default(),
        }
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// Whether `key` may proceed now.
    pub async fn check(&self, key: K) -> bool {
        let now = Instant::now();
        let quota = self.quota;
        self.buckets
            .lock()
            .await
            .entry(key)
            .or_insert_with(|| Bucket::full(quota, now))
            .admit(quota, now)
    }

    /// Forget keys idle for longer than `idle`. Returns how many were dropped.
    pub async fn purge_stale(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.touched) < idle);
        before - buckets.len()
    }
}

/// Rejects a request with 429 once its client IP ran out of tokens.
/// Requests without a recognizable client address pass.
pub async fn limit_by_ip(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ServerError> {
    match client_ip(&req) {
        Some(ip) if !limiter.check(ip).await => {
            warn!(ip = %ip, "request rate limit exceeded");
            Err(ServerError::RateLimited)
        }
        _ => Ok(next.run(req).await),
    }
}

/// The peer address, else the first `X-Forwarded-For` hop, else `X-Real-IP`.
fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    let header = |name: &str| -> Option<IpAddr> {
        let value = req.headers().get(name)?.to_str().ok()?;
        value.split(',').next()?.trim().parse().ok()
    };

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .or_else(|| header("x-forwarded-for"))
        .or_else(|| header("x-real-ip"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTA: Quota = Quota {
        per_second: 2.0,
        burst: 3.0,
    };

    #[test]
    fn test_bucket_refills_with_time() {
        let start = Instant::now();
        let mut bucket = Bucket::full(QUOTA, start);

        assert!((0..3).all(|_| bucket.admit(QUOTA, start)));
        assert!(!bucket.admit(QUOTA, start));

        // Half a second at 2/s buys exactly one more request.
        let later = start + Duration::from_millis(500);
        assert!(bucket.admit(QUOTA, later));
        assert!(!bucket.admit(QUOTA, later));

        // Long idle periods never exceed the burst.
        let much_later = later + Duration::from_secs(60);
        assert!((0..3).all(|_| bucket.admit(QUOTA, much_later)));
        assert!(!bucket.admit(QUOTA, much_later));
    }

    #[tokio::test]
    async fn test_keys_have_separate_buckets() {
        let limiter = SearchLimiter::new(0.5, 2.0);
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(limiter.check(alice).await);
        assert!(limiter.check(alice).await);
        assert!(!limiter.check(alice).await);
        assert!(limiter.check(bob).await);
    }

    #[tokio::test]
    async fn test_purge_drops_idle_keys() {
        let limiter: RateLimiter = RateLimiter::new(10.0, 5.0);
        limiter.check("10.0.0.1".parse().unwrap()).await;
        limiter.check("10.0.0.2".parse().unwrap()).await;

        assert_eq!(limiter.purge_stale(Duration::from_secs(600)).await, 0);
        assert_eq!(limiter.purge_stale(Duration::ZERO).await, 2);
    }

    #[test]
    fn test_client_ip_header_fallback() {
        let forwarded = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&forwarded), "203.0.113.7".parse().ok());

        let real = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&real), "198.51.100.2".parse().ok());

        let mut direct = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(())
            .unwrap();
        direct
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(client_ip(&direct), "127.0.0.1".parse().ok());

        assert_eq!(client_ip(&Request::builder().body(()).unwrap()), None);
    }
}
