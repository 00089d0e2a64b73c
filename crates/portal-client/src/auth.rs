//! Credential attachment and single-shot refresh.
//!
//! The [`AuthCoordinator`] is injected into every caller; nothing in this
//! crate reaches for global credential state. Its side effects are limited to
//! [`AuthCoordinator::refresh_if_needed`] and [`AuthCoordinator::logout`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use tokio::sync::Mutex;

use crate::error::{ErrorKind, PortalError, Result};
use crate::notify::{Notification, NotificationSink, Severity};
use crate::transport::ApiRequest;

/// Header carrying a static API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Supplies and refreshes credentials.
///
/// Implementations own the token state and must serialize their own writes;
/// reads may happen concurrently from many calls.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Static API key, if one is configured. Takes precedence over tokens.
    async fn api_key(&self) -> Option<String>;

    /// Current bearer token.
    async fn access_token(&self) -> Option<String>;

    /// Obtain a new access token. Returns whether it succeeded.
    async fn refresh(&self) -> bool;

    /// Drop the session.
    async fn logout(&self);
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum RefreshState {
    #[default]
    NotAttempted,
    Succeeded,
    Failed,
}

/// Auth state for one logical call, shared by every endpoint of a chain.
///
/// Allows at most one refresh and at most one logout over its lifetime.
/// Calls that send no session credentials never refresh or log out, and
/// probes may refresh but never log out.
#[derive(Debug)]
pub struct AuthContext {
    refresh: RefreshState,
    logged_out: bool,
    allow_refresh: bool,
    allow_logout: bool,
}

impl Default for AuthContext {
    fn default() -> Self {
        Self {
            refresh: RefreshState::NotAttempted,
            logged_out: false,
            allow_refresh: true,
            allow_logout: true,
        }
    }
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a call that may refresh the token but must not end the
    /// session when the refresh fails.
    pub fn without_logout() -> Self {
        Self {
            allow_logout: false,
            ..Self::default()
        }
    }

    /// Context for a call that carries no session credentials.
    pub fn anonymous() -> Self {
        Self {
            allow_refresh: false,
            allow_logout: false,
            ..Self::default()
        }
    }

    /// Stop this context from touching the session from now on.
    pub fn detach_session(&mut self) {
        self.allow_refresh = false;
        self.allow_logout = false;
    }

    /// Whether a 401 may still trigger a refresh.
    pub fn can_refresh(&self) -> bool {
        self.allow_refresh && self.refresh == RefreshState::NotAttempted
    }

    pub fn refresh_attempted(&self) -> bool {
        self.refresh != RefreshState::NotAttempted
    }

    pub fn refresh_failed(&self) -> bool {
        self.refresh == RefreshState::Failed
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out
    }
}

/// Attaches credentials and coordinates refresh/logout.
pub struct AuthCoordinator {
    provider: Arc<dyn CredentialProvider>,
    notifier: Arc<dyn NotificationSink>,
    // Single-flight gate: concurrent calls that hit 401 share one refresh.
    refresh_gate: Mutex<()>,
    refresh_generation: AtomicU64,
    last_refresh_ok: AtomicBool,
}

impl AuthCoordinator {
    pub fn new(provider: Arc<dyn CredentialProvider>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            provider,
            notifier,
            refresh_gate: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
            last_refresh_ok: AtomicBool::new(false),
        }
    }

    pub fn notifier(&self) -> &Arc<dyn NotificationSink> {
        &self.notifier
    }

    /// Whether any credential is available at all.
    pub async fn has_credentials(&self) -> bool {
        self.provider.api_key().await.is_some() || self.provider.access_token().await.is_some()
    }

    /// Add an `x-api-key` header when a static key is configured, otherwise a
    /// bearer header from the current token.
    pub async fn attach_credentials(&self, mut request: ApiRequest) -> Result<ApiRequest> {
        if let Some(key) = self.provider.api_key().await {
            let value = HeaderValue::from_str(&key)
                .map_err(|_| PortalError::invalid_request("Invalid API key format"))?;
            request.headers.insert(API_KEY_HEADER, value);
            return Ok(request);
        }

        match self.provider.access_token().await {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|_| PortalError::invalid_request("Invalid access token format"))?;
                request.headers.insert(AUTHORIZATION, value);
            }
            None => debug!("[Auth] No credentials available for {}", request.url),
        }
        Ok(request)
    }

    /// Refresh once per [`AuthContext`].
    ///
    /// Returns `false` without touching the provider when this context has
    /// already spent its refresh.
    pub async fn refresh_if_needed(&self, ctx: &mut AuthContext) -> bool {
        if !ctx.allow_refresh {
            debug!("[Auth] Call carries no session credentials, not refreshing");
            return false;
        }
        if ctx.refresh_attempted() {
            debug!("[Auth] Refresh already attempted for this call");
            return false;
        }

        let ok = self.refresh_shared().await;
        ctx.refresh = if ok {
            RefreshState::Succeeded
        } else {
            RefreshState::Failed
        };
        info!("[Auth] Token refresh result: {}", ok);
        ok
    }

    async fn refresh_shared(&self) -> bool {
        let observed = self.refresh_generation.load(Ordering::Acquire);
        let _guard = self.refresh_gate.lock().await;

        if self.refresh_generation.load(Ordering::Acquire) != observed {
            // Another call finished a refresh while this one waited
            return self.last_refresh_ok.load(Ordering::Acquire);
        }

        let ok = self.provider.refresh().await;
        self.last_refresh_ok.store(ok, Ordering::Release);
        self.refresh_generation.fetch_add(1, Ordering::AcqRel);
        ok
    }

    /// Drop the session and tell the user. No-op if this context already
    /// logged out.
    pub async fn logout(&self, ctx: &mut AuthContext) {
        if ctx.logged_out {
            return;
        }
        if !ctx.allow_logout {
            debug!("[Auth] Logout suppressed for this call");
            return;
        }
        ctx.logged_out = true;

        warn!("[Auth] Token refresh failed and retries are exhausted, logging out");
        self.provider.logout().await;
        self.notifier.notify(Notification::new(
            Severity::Fatal,
            ErrorKind::AuthExpired.user_message(None),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCredentials, RecordingSink};
    use reqwest::Method;
    use std::time::Duration;

    fn coordinator(creds: Arc<MockCredentials>) -> (AuthCoordinator, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (AuthCoordinator::new(creds, sink.clone()), sink)
    }

    fn request() -> ApiRequest {
        ApiRequest::new(Method::GET, "http://portal.test/api/sdk/prompts")
    }

    #[tokio::test]
    async fn test_api_key_takes_precedence() {
        let creds = Arc::new(MockCredentials::with_token("tok").api_key("key-123"));
        let (auth, _) = coordinator(creds);

        let request = auth.attach_credentials(request()).await.unwrap();
        assert_eq!(request.headers.get(API_KEY_HEADER).unwrap(), "key-123");
        assert!(request.headers.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let creds = Arc::new(MockCredentials::with_token("tok"));
        let (auth, _) = coordinator(creds);

        let request = auth.attach_credentials(request()).await.unwrap();
        assert_eq!(request.headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
    }

    #[tokio::test]
    async fn test_missing_credentials_leave_request_unchanged() {
        let creds = Arc::new(MockCredentials::anonymous());
        let (auth, _) = coordinator(creds);

        let request = auth.attach_credentials(request()).await.unwrap();
        assert!(request.headers.get(AUTHORIZATION).is_none());
        assert!(!auth.has_credentials().await);
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let creds = Arc::new(MockCredentials::with_token("bad\ntoken"));
        let (auth, _) = coordinator(creds);

        let err = auth.attach_credentials(request()).await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_refresh_at_most_once_per_context() {
        let creds = Arc::new(MockCredentials::with_token("tok").refresh_result(true));
        let (auth, _) = coordinator(creds.clone());
        let mut ctx = AuthContext::new();

        assert!(auth.refresh_if_needed(&mut ctx).await);
        assert!(!auth.refresh_if_needed(&mut ctx).await);
        assert_eq!(creds.refresh_calls(), 1);
        assert!(ctx.refresh_attempted());
        assert!(!ctx.refresh_failed());

        // A new logical call gets its own refresh
        let mut next = AuthContext::new();
        assert!(auth.refresh_if_needed(&mut next).await);
        assert_eq!(creds.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_recorded() {
        let creds = Arc::new(MockCredentials::with_token("tok").refresh_result(false));
        let (auth, _) = coordinator(creds);
        let mut ctx = AuthContext::new();

        assert!(!auth.refresh_if_needed(&mut ctx).await);
        assert!(ctx.refresh_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_share_one_refresh() {
        let creds = Arc::new(
            MockCredentials::with_token("tok")
                .refresh_result(true)
                .refresh_delay(Duration::from_millis(50)),
        );
        let (auth, _) = coordinator(creds.clone());
        let mut first = AuthContext::new();
        let mut second = AuthContext::new();

        let (a, b) = futures::join!(
            auth.refresh_if_needed(&mut first),
            auth.refresh_if_needed(&mut second)
        );

        assert!(a && b);
        assert_eq!(creds.refresh_calls(), 1);
        assert!(first.refresh_attempted() && second.refresh_attempted());
    }

    #[tokio::test]
    async fn test_logout_once_with_fatal_notification() {
        let creds = Arc::new(MockCredentials::with_token("tok"));
        let (auth, sink) = coordinator(creds.clone());
        let mut ctx = AuthContext::new();

        auth.logout(&mut ctx).await;
        auth.logout(&mut ctx).await;

        assert_eq!(creds.logout_calls(), 1);
        assert!(ctx.is_logged_out());
        let notifications = sink.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].severity, Severity::Fatal);
    }

    #[tokio::test]
    async fn test_anonymous_context_never_touches_session() {
        let creds = Arc::new(MockCredentials::with_token("tok").refresh_result(true));
        let (auth, sink) = coordinator(creds.clone());
        let mut ctx = AuthContext::anonymous();

        assert!(!ctx.can_refresh());
        assert!(!auth.refresh_if_needed(&mut ctx).await);
        auth.logout(&mut ctx).await;

        assert_eq!(creds.refresh_calls(), 0);
        assert_eq!(creds.logout_calls(), 0);
        assert!(!ctx.is_logged_out());
        assert!(sink.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_context_without_logout_still_refreshes() {
        let creds = Arc::new(MockCredentials::with_token("tok").refresh_result(false));
        let (auth, sink) = coordinator(creds.clone());
        let mut ctx = AuthContext::without_logout();

        assert!(ctx.can_refresh());
        assert!(!auth.refresh_if_needed(&mut ctx).await);
        auth.logout(&mut ctx).await;

        assert_eq!(creds.refresh_calls(), 1);
        assert_eq!(creds.logout_calls(), 0);
        assert!(sink.notifications().is_empty());
    }
}
