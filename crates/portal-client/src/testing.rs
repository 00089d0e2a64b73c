//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::CredentialProvider;
use crate::notify::{Notification, NotificationSink};
use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};

pub(crate) type Outcome = Result<ApiResponse, TransportError>;

pub(crate) fn ok(body: &str) -> Outcome {
    Ok(ApiResponse::new(200, body))
}

pub(crate) fn status(code: u16) -> Outcome {
    Ok(ApiResponse::new(code, r#"{"message":"scripted"}"#))
}

pub(crate) fn no_response() -> Outcome {
    Err(TransportError::NoResponse("connection refused".to_string()))
}

/// Transport that replays a fixed list of outcomes and records every request.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Option<Outcome>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Outcome returned once the script runs out.
    pub(crate) fn then_repeat(mut self, outcome: Outcome) -> Self {
        self.fallback = Some(outcome);
        self
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Outcome {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        next.or_else(|| self.fallback.clone())
            .expect("scripted transport ran out of outcomes")
    }
}

/// Credential provider with scripted refresh behaviour.
pub(crate) struct MockCredentials {
    api_key: Option<String>,
    token: Mutex<Option<String>>,
    refresh_ok: bool,
    refresh_delay: Option<Duration>,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl MockCredentials {
    pub(crate) fn with_token(token: &str) -> Self {
        Self {
            api_key: None,
            token: Mutex::new(Some(token.to_string())),
            refresh_ok: false,
            refresh_delay: None,
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn anonymous() -> Self {
        let creds = Self::with_token("");
        *creds.token.lock().unwrap() = None;
        creds
    }

    pub(crate) fn api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub(crate) fn refresh_result(mut self, ok: bool) -> Self {
        self.refresh_ok = ok;
        self
    }

    pub(crate) fn refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for MockCredentials {
    async fn api_key(&self) -> Option<String> {
        self.api_key.clone()
    }

    async fn access_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    async fn refresh(&self) -> bool {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        if self.refresh_ok {
            *self.token.lock().unwrap() = Some("refreshed-token".to_string());
        }
        self.refresh_ok
    }

    async fn logout(&self) {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        *self.token.lock().unwrap() = None;
    }
}

/// Sink that keeps every notification.
#[derive(Default)]
pub(crate) struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}
