//! Bearer session tokens and the `AuthUser` extractor.

use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use hive_shared::token::{SessionClaims, TokenSigner};
use uuid::Uuid;

use crate::api::AppState;
use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct SessionIssuer {
    signer: TokenSigner,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(root_secret: &[u8; 32], ttl: Duration) -> Self {
        Self {
            signer: TokenSigner::for_sessions(root_secret),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, ServerError> {
        let claims = SessionClaims {
            sub: user_id,
            exp: expires_at(now, self.ttl),
        };
        Ok(self.signer.sign(&claims)?)
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, ServerError> {
        let claims: SessionClaims = self.signer.verify(token, now)?;
        Ok(claims.sub)
    }
}

/// Unix expiry `ttl` after `now`, saturating instead of wrapping.
pub(crate) fn expires_at(now: DateTime<Utc>, ttl: Duration) -> i64 {
    let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    now.timestamp().saturating_add(ttl)
}

/// The authenticated caller of a request. Rejects with 401 when the token is
/// missing, invalid, expired, or names a user that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServerError::Unauthorized("missing bearer token".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServerError::Unauthorized("missing bearer token".into()))?;

        let user_id = state.sessions.verify(token.trim(), Utc::now())?;

        let exists = state
            .db
            .call(move |db| Ok(db.find_user(user_id)?.is_some()))
            .await?;
        if !exists {
            return Err(ServerError::Unauthorized("unknown user".into()));
        }

        Ok(AuthUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let issuer = SessionIssuer::new(&[3u8; 32], Duration::from_secs(60));
        let user = Uuid::new_v4();
        let now = Utc::now();

        let token = issuer.issue(user, now).unwrap();
        assert_eq!(issuer.verify(&token, now).unwrap(), user);

        let later = now + chrono::Duration::seconds(61);
        assert!(matches!(
            issuer.verify(&token, later),
            Err(ServerError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let now = Utc::now();
        assert_eq!(expires_at(now, Duration::from_secs(u64::MAX)), i64::MAX);
        assert_eq!(
            expires_at(now, Duration::from_secs(60)),
            now.timestamp() + 60
        );

        let issuer = SessionIssuer::new(&[3u8; 32], Duration::from_secs(u64::MAX));
        let user = Uuid::new_v4();
        let token = issuer.issue(user, now).unwrap();
        assert_eq!(issuer.verify(&token, now).unwrap(), user);
    }
}
