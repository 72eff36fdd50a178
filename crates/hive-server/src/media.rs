use std::time::Duration;

use chrono::{DateTime, Utc};
use hive_shared::token::{MediaClaims, TokenSigner};
use uuid::Uuid;

use crate::auth::expires_at;
use crate::error::ServerError;

/// Issues channel-scoped credentials for the video transport.
#[derive(Debug, Clone)]
pub struct MediaTokenIssuer {
    signer: TokenSigner,
    app_id: String,
    ttl: Duration,
}

impl MediaTokenIssuer {
    pub fn new(root_secret: &[u8; 32], app_id: String, ttl: Duration) -> Self {
        Self {
            signer: TokenSigner::for_media(root_secret),
            app_id,
            ttl,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn issue(&self, channel: &str, uid: Uuid, now: DateTime<Utc>) -> Result<String, ServerError> {
        let claims = MediaClaims {
            app_id: self.app_id.clone(),
            channel: channel.to_string(),
            uid,
            exp: expires_at(now, self.ttl),
        };
        Ok(self.signer.sign(&claims)?)
    }

    /// Check a token against the channel it is presented for.
    pub fn verify(
        &self,
        token: &str,
        channel: &str,
        now: DateTime<Utc>,
    ) -> Result<MediaClaims, ServerError> {
        let claims: MediaClaims = self.signer.verify(token, now)?;
        if claims.channel != channel || claims.app_id != self.app_id {
            return Err(ServerError::Forbidden("media token not valid for this channel".into()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_bound_to_channel() {
        let issuer = MediaTokenIssuer::new(&[1u8; 32], "hive-test".into(), Duration::from_secs(600));
        let uid = Uuid::new_v4();
        let now = Utc::now();

        let token = issuer.issue("call_1_aaaaaaaaa", uid, now).unwrap();
        let claims = issuer.verify(&token, "call_1_aaaaaaaaa", now).unwrap();
        assert_eq!(claims.uid, uid);
        assert_eq!(claims.app_id, "hive-test");

        assert!(matches!(
            issuer.verify(&token, "call_2_bbbbbbbbb", now),
            Err(ServerError::Forbidden(_))
        ));
    }

    #[test]
    fn test_session_secret_does_not_verify_media_tokens() {
        let secret = [4u8; 32];
        let issuer = MediaTokenIssuer::new(&secret, "hive-test".into(), Duration::from_secs(600));
        let token = issuer.issue("call_1_x", Uuid::new_v4(), Utc::now()).unwrap();

        let sessions = crate::auth::SessionIssuer::new(&secret, Duration::from_secs(600));
        assert!(sessions.verify(&token, Utc::now()).is_err());
    }
}
