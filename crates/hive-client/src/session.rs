//! The signed-in user. Every other store reads identity from here.

use std::sync::Arc;

use hive_shared::models::User;
use hive_shared::protocol::{ProfileUpdateRequest, RegisterRequest};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::error::ClientError;

#[derive(Clone)]
pub struct SessionStore {
    api: ApiClient,
    user: Arc<RwLock<Option<User>>>,
}

impl SessionStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            user: Arc::new(RwLock::new(None)),
        }
    }

    /// Validate locally, then create the profile and keep its session.
    pub async fn register(&self, request: RegisterRequest) -> Result<User, ClientError> {
        request.validate()?;
        let response = self.api.register(&request).await?;
        info!(user_id = %response.user.id, "registered");
        *self.user.write().await = Some(response.user.clone());
        Ok(response.user)
    }

    /// Resume with a token obtained earlier.
    pub async fn sign_in(&self, session_token: String) -> Result<User, ClientError> {
        self.api.set_token(Some(session_token));
        match self.refresh().await {
            Ok(user) => Ok(user),
            Err(e) => {
                self.api.set_token(None);
                Err(e)
            }
        }
    }

    pub async fn refresh(&self) -> Result<User, ClientError> {
        let user = self.api.me().await?;
        *self.user.write().await = Some(user.clone());
        Ok(user)
    }

    pub async fn update_profile(&self, request: ProfileUpdateRequest) -> Result<User, ClientError> {
        request.validate()?;
        let user = self.api.update_profile(&request).await?;
        *self.user.write().await = Some(user.clone());
        Ok(user)
    }

    pub async fn set_presence(&self, online: bool) -> Result<User, ClientError> {
        let user = self.api.set_presence(online).await?;
        *self.user.write().await = Some(user.clone());
        Ok(user)
    }

    pub async fn sign_out(&self) {
        self.api.set_token(None);
        *self.user.write().await = None;
    }

    pub async fn user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    pub async fn user_id(&self) -> Option<Uuid> {
        self.user.read().await.as_ref().map(|u| u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.is_authenticated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_validates_before_sending() {
        let store = SessionStore::new(ApiClient::new("http://127.0.0.1:9"));
        let request = RegisterRequest {
            display_name: "  ".into(),
            interests: vec!["Music".into()],
            ..Default::default()
        };

        let err = store.register(request).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(store.user().await.is_none());
        assert!(!store.is_authenticated());
    }
}
