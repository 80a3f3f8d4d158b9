//! Existence lookups against the user and pet services.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::PlatformConfig;
use crate::error::{AlertError, AlertResult};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user_id: i32) -> AlertResult<bool>;
}

#[async_trait]
pub trait PetDirectory: Send + Sync {
    async fn pet_exists(&self, pet_id: i32) -> AlertResult<bool>;
}

/// Accepts every id. Local development without a user/pet service.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenDirectory;

#[async_trait]
impl UserDirectory for OpenDirectory {
    async fn user_exists(&self, _user_id: i32) -> AlertResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl PetDirectory for OpenDirectory {
    async fn pet_exists(&self, _pet_id: i32) -> AlertResult<bool> {
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_platform(platform: &PlatformConfig) -> Option<Self> {
        platform
            .base_url
            .as_ref()
            .map(|url| Self::new(url.clone(), platform.api_key.clone()))
    }

    async fn exists(&self, resource: &str, id: i32) -> AlertResult<bool> {
        let url = format!("{}/{}/{}", self.base_url, resource, id);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            AlertError::Collaborator(format!("{} lookup failed: {}", resource, e))
        })?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                tracing::warn!(%url, %status, "Directory lookup returned unexpected status");
                Err(AlertError::Collaborator(format!(
                    "{} lookup returned {}",
                    resource, status
                )))
            }
        }
    }
}

#[async_trait]
impl UserDirectory for HttpDirectory {
    async fn user_exists(&self, user_id: i32) -> AlertResult<bool> {
        self.exists("users", user_id).await
    }
}

#[async_trait]
impl PetDirectory for HttpDirectory {
    async fn pet_exists(&self, pet_id: i32) -> AlertResult<bool> {
        self.exists("pets", pet_id).await
    }
}
