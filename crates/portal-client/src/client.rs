//! Portal API client: the business-level operations.
//!
//! Each operation picks an [`OperationPolicy`] and an [`EndpointSpec`] and
//! runs them through the [`FallbackChain`]. Primary operations return typed
//! errors and notify the user; best-effort operations (usage telemetry)
//! return `false` on failure and only log.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::{AuthContext, AuthCoordinator, CredentialProvider};
use crate::classifier::classify;
use crate::error::{PortalError, Result};
use crate::fallback::{Endpoint, EndpointSpec, FallbackChain, Payload};
use crate::notify::{Notification, NotificationSink, Severity};
use crate::policy::OperationPolicy;
use crate::transport::{ApiResponse, Transport};
use crate::types::*;

/// Timeout for usage recording calls.
const RECORD_TIMEOUT_SECS: u64 = 15;

/// Timeout for the connectivity probe.
const PROBE_TIMEOUT_SECS: u64 = 5;

const DEFAULT_PROMPT_USAGE_CONTEXT: &str = "claude-code-extension";
const DEFAULT_TOKEN_USAGE_CONTEXT: &str = "vscode-extension";

/// Client for the prompt portal API.
///
/// Cloning is cheap; clones share credentials, transport and the
/// cancellation token.
#[derive(Clone)]
pub struct PortalApiClient {
    base_url: String,
    chain: FallbackChain,
    auth: Arc<AuthCoordinator>,
    cancel: CancellationToken,
}

impl PortalApiClient {
    /// Create a new portal client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the portal API, including the `/api` prefix
    /// * `transport` - Performs the network calls
    /// * `credentials` - Supplies API key or bearer token and handles refresh
    /// * `notifier` - Receives user-facing failure messages
    pub fn new(
        base_url: &str,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let auth = Arc::new(AuthCoordinator::new(credentials, notifier));
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            chain: FallbackChain::new(transport, auth.clone()),
            auth,
            cancel: CancellationToken::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cancel every in-flight and future call of this client.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn call(
        &self,
        endpoints: &EndpointSpec,
        payload: &Payload,
        policy: &OperationPolicy,
        ctx: &mut AuthContext,
    ) -> Result<ApiResponse> {
        self.chain
            .invoke_with_fallback(endpoints, payload, policy, ctx, &self.cancel)
            .await
    }

    /// Run a primary operation: decode the body on success, notify on failure.
    async fn call_primary<T: DeserializeOwned>(
        &self,
        operation: &str,
        endpoints: EndpointSpec,
        payload: Payload,
    ) -> Result<T> {
        let policy = OperationPolicy::default();
        let mut ctx = AuthContext::new();

        let result = match self.call(&endpoints, &payload, &policy, &mut ctx).await {
            Ok(response) => response
                .json::<T>()
                .map_err(|e| PortalError::from(classify(&e, &policy))),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            self.report(operation, e, &ctx);
        }
        result
    }

    /// Run a best-effort operation. Never fails; failures are only logged.
    async fn call_best_effort(&self, operation: &str, endpoints: EndpointSpec, payload: Payload) -> bool {
        let mut ctx = AuthContext::new();
        match self
            .call(&endpoints, &payload, &OperationPolicy::telemetry(), &mut ctx)
            .await
        {
            Ok(response) => {
                info!("[PortalApi] {} recorded (status {})", operation, response.status);
                true
            }
            Err(e) => {
                warn!("[PortalApi] {} failed: {}", operation, e);
                false
            }
        }
    }

    fn report(&self, operation: &str, err: &PortalError, ctx: &AuthContext) {
        error!("[PortalApi] {} failed: {}", operation, err);

        // Logout already told the user; cancellation is the caller's own doing
        if ctx.is_logged_out() || matches!(err, PortalError::Cancelled) {
            return;
        }
        self.auth
            .notifier()
            .notify(Notification::new(Severity::Error, err.user_message()));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Prompt Library
    // ─────────────────────────────────────────────────────────────────────────

    /// List prompts.
    ///
    /// GET /sdk/prompts?category=...&tags=a,b
    pub async fn get_prompts(&self, filters: &PromptFilters) -> Result<Vec<Prompt>> {
        let mut params = Vec::new();
        if let Some(category) = &filters.category {
            params.push(format!("category={}", urlencoding::encode(category)));
        }
        if !filters.tags.is_empty() {
            params.push(format!("tags={}", urlencoding::encode(&filters.tags.join(","))));
        }
        let mut path = "/sdk/prompts".to_string();
        if !params.is_empty() {
            path = format!("{}?{}", path, params.join("&"));
        }

        let response: PromptsResponse = self
            .call_primary("get_prompts", EndpointSpec::single(self.url(&path)), Payload::get())
            .await?;
        debug!("[PortalApi] Fetched {} prompts", response.prompts.len());
        Ok(response.prompts)
    }

    /// Get a single prompt. `None` when the server answers without one.
    ///
    /// GET /sdk/prompts/{promptId}
    pub async fn get_prompt_detail(&self, prompt_id: &str) -> Result<Option<Prompt>> {
        let path = format!("/sdk/prompts/{}", urlencoding::encode(prompt_id));
        let response: PromptDetailResponse = self
            .call_primary("get_prompt_detail", EndpointSpec::single(self.url(&path)), Payload::get())
            .await?;
        Ok(response.prompt)
    }

    /// Get the version history of a prompt.
    ///
    /// GET /sdk/prompts/{promptId}/versions
    pub async fn get_prompt_versions(&self, prompt_id: &str) -> Result<Vec<PromptVersion>> {
        let path = format!("/sdk/prompts/{}/versions", urlencoding::encode(prompt_id));
        let response: VersionsResponse = self
            .call_primary(
                "get_prompt_versions",
                EndpointSpec::single(self.url(&path)),
                Payload::get(),
            )
            .await?;
        Ok(response.into_versions())
    }

    /// Get prompts updated since `since` (milliseconds).
    ///
    /// GET /sdk/prompts/sync?since=...
    pub async fn get_sync_updates(&self, since: Option<i64>) -> Result<SyncUpdates> {
        let path = match since {
            Some(ts) => format!("/sdk/prompts/sync?since={}", ts),
            None => "/sdk/prompts/sync".to_string(),
        };
        let response: SyncResponse = self
            .call_primary("get_sync_updates", EndpointSpec::single(self.url(&path)), Payload::get())
            .await?;

        Ok(SyncUpdates {
            prompts: response.prompts,
            timestamp: response
                .timestamp
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
        })
    }

    /// Fetch a shared prompt by its public URL. No credentials are sent.
    ///
    /// The token is the last path segment of `url`; the request always goes
    /// to this client's own base URL.
    ///
    /// GET /prompts/public/{token}
    pub async fn get_prompt_from_public_url(&self, url: &str) -> Result<serde_json::Value> {
        let token = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|t| !t.is_empty() && !t.contains(':'))
            .ok_or_else(|| PortalError::invalid_request("Invalid prompt URL format"))?;

        let path = format!("/prompts/public/{}", urlencoding::encode(token));
        info!("[PortalApi] Fetching public prompt {}", token);
        self.call_primary(
            "get_prompt_from_public_url",
            EndpointSpec::single(self.url(&path)),
            Payload::get().anonymous(),
        )
        .await
    }

    /// Increment the launch counter of a user.
    ///
    /// This is a write; retries carry one idempotency key so a server that
    /// honours it can de-duplicate.
    ///
    /// POST /simple/users/{userId}/increment-claude-code-launch
    pub async fn increment_launch_count(&self, user_id: &str) -> Result<LaunchCountResponse> {
        let path = format!(
            "/simple/users/{}/increment-claude-code-launch",
            urlencoding::encode(user_id)
        );
        let response: LaunchCountResponse = self
            .call_primary(
                "increment_launch_count",
                EndpointSpec::single(self.url(&path)),
                Payload::post(serde_json::json!({})).idempotency_key(new_idempotency_key()),
            )
            .await?;

        info!(
            "[PortalApi] Launch count updated: success={}, count={:?}",
            response.success,
            response.data.as_ref().and_then(|d| d.claude_code_launch_count)
        );
        Ok(response)
    }

    /// Check that credentials exist and the API accepts them.
    ///
    /// GET /auth/users/me
    pub async fn test_api_connection(&self) -> bool {
        if !self.auth.has_credentials().await {
            warn!("[PortalApi] Connection test skipped: no credentials");
            return false;
        }

        // A failed probe reports false; it never ends the session
        let mut ctx = AuthContext::without_logout();
        let payload = Payload::get().timeout(Duration::from_secs(PROBE_TIMEOUT_SECS));
        let endpoints = EndpointSpec::single(self.url("/auth/users/me"));

        match self
            .call(&endpoints, &payload, &OperationPolicy::probe(), &mut ctx)
            .await
        {
            Ok(response) => match response.json::<CurrentUserResponse>() {
                Ok(CurrentUserResponse { user: Some(_) }) => {
                    info!("[PortalApi] Connection test succeeded");
                    true
                }
                _ => {
                    warn!(
                        "[PortalApi] Connection test: unexpected response ({})",
                        response.status
                    );
                    false
                }
            },
            Err(e) => {
                warn!("[PortalApi] Connection test failed: {}", e);
                false
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Usage Telemetry (best effort)
    // ─────────────────────────────────────────────────────────────────────────

    /// Record that a prompt version was used.
    ///
    /// Tries `/prompts/{id}/usage`, then `/sdk/prompts/{id}/usage`, then the
    /// legacy `/sdk/prompts/usage` which takes the prompt id in the body.
    pub async fn record_prompt_usage(
        &self,
        prompt_id: &str,
        version_id: &str,
        context: Option<&str>,
    ) -> bool {
        let context = context.unwrap_or(DEFAULT_PROMPT_USAGE_CONTEXT).to_string();
        let body = PromptUsageRequest {
            version_id: version_id.to_string(),
            context: context.clone(),
        };
        let legacy_body = LegacyPromptUsageRequest {
            prompt_id: prompt_id.to_string(),
            version_id: version_id.to_string(),
            context,
        };
        let (body, legacy_body) = match (to_json(&body), to_json(&legacy_body)) {
            (Some(body), Some(legacy_body)) => (body, legacy_body),
            _ => return false,
        };

        let encoded = urlencoding::encode(prompt_id);
        let endpoints = EndpointSpec::single(self.url(&format!("/prompts/{}/usage", encoded)))
            .then(Endpoint::new(
                self.url(&format!("/sdk/prompts/{}/usage", encoded)),
            ))
            .then(Endpoint::new(self.url("/sdk/prompts/usage")).with_body(legacy_body));

        self.call_best_effort("record_prompt_usage", endpoints, usage_payload(body))
            .await
    }

    /// Record model token usage.
    ///
    /// Tries `/usage/claude-tokens`, then `/tokens/usage`.
    pub async fn record_token_usage(
        &self,
        token_count: u64,
        model_id: &str,
        context: Option<&str>,
    ) -> bool {
        let body = TokenUsageRequest {
            token_count,
            model_id: model_id.to_string(),
            context: context.unwrap_or(DEFAULT_TOKEN_USAGE_CONTEXT).to_string(),
        };
        let Some(body) = to_json(&body) else {
            return false;
        };

        let endpoints = EndpointSpec::single(self.url("/usage/claude-tokens"))
            .then(Endpoint::new(self.url("/tokens/usage")));

        self.call_best_effort("record_token_usage", endpoints, usage_payload(body))
            .await
    }
}

fn new_idempotency_key() -> String {
    Uuid::new_v4().to_string()
}

fn usage_payload(body: serde_json::Value) -> Payload {
    Payload::post(body)
        .timeout(Duration::from_secs(RECORD_TIMEOUT_SECS))
        .idempotency_key(new_idempotency_key())
}

fn to_json<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| error!("[PortalApi] Failed to serialize request: {}", e))
        .ok()
}
