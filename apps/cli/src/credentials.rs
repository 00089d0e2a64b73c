use std::time::Duration;

use appgenius_portal_client::{CredentialProvider, Notification, NotificationSink, Severity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::Config;

#[derive(Debug, Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    data: Option<RefreshData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Credentials taken from the environment, refreshed against the portal.
pub struct EnvCredentials {
    api_url: String,
    api_key: Option<String>,
    tokens: RwLock<Tokens>,
    client: reqwest::Client,
}

impl EnvCredentials {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            tokens: RwLock::new(Tokens {
                access: config.access_token.clone(),
                refresh: config.refresh_token.clone(),
            }),
            client,
        })
    }

    async fn request_new_tokens(&self, refresh_token: &str) -> anyhow::Result<RefreshData> {
        let response = self
            .client
            .post(format!("{}/auth/refresh-token", self.api_url))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?
            .error_for_status()?;
        let body: RefreshResponse = response.json().await?;
        body.data
            .filter(|d| d.access_token.is_some())
            .ok_or_else(|| anyhow::anyhow!("refresh response carried no access token"))
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn api_key(&self) -> Option<String> {
        self.api_key.clone()
    }

    async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.access.clone()
    }

    async fn refresh(&self) -> bool {
        let Some(refresh_token) = self.tokens.read().await.refresh.clone() else {
            tracing::warn!("No refresh token configured");
            return false;
        };

        match self.request_new_tokens(&refresh_token).await {
            Ok(data) => {
                let mut tokens = self.tokens.write().await;
                tokens.access = data.access_token;
                if data.refresh_token.is_some() {
                    tokens.refresh = data.refresh_token;
                }
                tracing::info!("Access token refreshed");
                true
            }
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                false
            }
        }
    }

    async fn logout(&self) {
        let refresh_token = {
            let mut tokens = self.tokens.write().await;
            tokens.access = None;
            tokens.refresh.take()
        };

        let Some(refresh_token) = refresh_token else {
            return;
        };
        let result = self
            .client
            .post(format!("{}/auth/logout", self.api_url))
            .timeout(Duration::from_secs(5))
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await;
        if let Err(e) = result {
            tracing::debug!("Server-side logout failed: {}", e);
        }
    }
}

/// Prints notifications to stderr.
pub struct ConsoleNotifier;

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        let label = match notification.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        eprintln!("[{}] {}", label, notification.message);
    }
}
