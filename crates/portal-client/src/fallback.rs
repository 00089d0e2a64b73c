//! Ordered endpoint cascade for one logical operation.
//!
//! Endpoints are tried strictly in order, never in parallel. Every endpoint
//! runs under the full retry policy, except that a 404 advances at once.
//! The [`AuthContext`] is shared across the chain, so a refresh spent on the
//! primary endpoint is not repeated on the fallbacks.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use reqwest::header::HeaderValue;
use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthContext, AuthCoordinator};
use crate::error::{ClassifiedError, ErrorKind, PortalError, Result};
use crate::executor::{AttemptError, InvocationExecutor};
use crate::policy::OperationPolicy;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Header used to let the server de-duplicate retried writes.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// One request target.
#[derive(Clone, Debug, PartialEq)]
pub struct Endpoint {
    pub url: String,
    /// Body override for endpoints that expect a different payload shape.
    pub body: Option<serde_json::Value>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Ordered endpoint variants: `[primary, fallback1, fallback2, ...]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EndpointSpec {
    endpoints: Vec<Endpoint>,
}

impl EndpointSpec {
    pub fn single(url: impl Into<String>) -> Self {
        Self {
            endpoints: vec![Endpoint::new(url)],
        }
    }

    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }

    /// Append a fallback.
    pub fn then(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// What to send to each endpoint.
#[derive(Clone, Debug)]
pub struct Payload {
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub timeout: Option<Duration>,
    /// Skip credential attachment (public endpoints).
    pub anonymous: bool,
    /// Sent unchanged on every attempt and every endpoint of the call.
    pub idempotency_key: Option<String>,
}

impl Payload {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            body: None,
            timeout: None,
            anonymous: false,
            idempotency_key: None,
        }
    }

    pub fn post(body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Drives an [`InvocationExecutor`] over an [`EndpointSpec`].
#[derive(Clone)]
pub struct FallbackChain {
    executor: InvocationExecutor,
    transport: Arc<dyn Transport>,
}

impl FallbackChain {
    pub fn new(transport: Arc<dyn Transport>, auth: Arc<AuthCoordinator>) -> Self {
        Self {
            executor: InvocationExecutor::new(auth),
            transport,
        }
    }

    pub fn executor(&self) -> &InvocationExecutor {
        &self.executor
    }

    /// Try each endpoint in order until one succeeds.
    ///
    /// Returns the first success, or the last classified error once every
    /// endpoint is exhausted. Cancellation and logout end the cascade early.
    pub async fn invoke_with_fallback(
        &self,
        endpoints: &EndpointSpec,
        payload: &Payload,
        policy: &OperationPolicy,
        ctx: &mut AuthContext,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse> {
        let mut last_error: Option<ClassifiedError> = None;
        if payload.anonymous {
            ctx.detach_session();
        }

        for (index, endpoint) in endpoints.iter().enumerate() {
            let result = self
                .executor
                .execute_with_retry(policy, ctx, cancel, || self.send_once(endpoint, payload))
                .await;

            match result {
                Ok(response) => {
                    if index > 0 {
                        info!(
                            "[Fallback] Succeeded on fallback endpoint {} ({})",
                            index, endpoint.url
                        );
                    }
                    return Ok(response);
                }
                Err(PortalError::Api(error)) => {
                    if ctx.is_logged_out() {
                        return Err(error.into());
                    }
                    if error.kind == ErrorKind::NotFound {
                        warn!("[Fallback] Endpoint not found: {}", endpoint.url);
                    } else {
                        warn!("[Fallback] Endpoint {} failed: {}", endpoint.url, error);
                    }
                    last_error = Some(error);
                }
                Err(other) => return Err(other),
            }
        }

        match last_error {
            Some(error) => Err(error.into()),
            None => Err(PortalError::invalid_request("No endpoints to invoke")),
        }
    }

    async fn send_once(
        &self,
        endpoint: &Endpoint,
        payload: &Payload,
    ) -> std::result::Result<ApiResponse, AttemptError> {
        let mut request = ApiRequest::new(payload.method.clone(), endpoint.url.clone());
        if let Some(body) = endpoint.body.as_ref().or(payload.body.as_ref()) {
            request = request.json(body.clone());
        }
        if let Some(timeout) = payload.timeout {
            request = request.timeout(timeout);
        }
        if let Some(key) = &payload.idempotency_key {
            let value = HeaderValue::from_str(key)
                .map_err(|_| PortalError::invalid_request("Invalid idempotency key"))?;
            request.headers.insert(IDEMPOTENCY_KEY_HEADER, value);
        }
        if !payload.anonymous {
            request = self.executor.auth().attach_credentials(request).await?;
        }

        Ok(self.transport.send(request).await?.error_for_status()?)
    }
}
