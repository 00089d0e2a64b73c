//! Bounded retry with exponential backoff, jitter and single-shot refresh.
//!
//! # States
//! ```text
//! ATTEMPTING → DONE        success
//! ATTEMPTING → BACKOFF     retryable failure, budget remains → ATTEMPTING
//! ATTEMPTING → REFRESHING  401, refresh not yet attempted   → ATTEMPTING
//! ATTEMPTING → FAILED      non-retryable, budget exhausted, or refresh spent
//! ```
//!
//! A successful refresh buys one extra attempt that is not charged against
//! `max_retries`, so one call makes at most `max_retries + 2` attempts.

use std::future::Future;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthContext, AuthCoordinator};
use crate::classifier::classify;
use crate::error::{ClassifiedError, ErrorKind, PortalError, Result};
use crate::policy::OperationPolicy;
use crate::transport::TransportError;

/// Retry bookkeeping for one in-flight call.
#[derive(Debug, Default)]
pub struct AttemptState {
    /// Retries consumed so far (0 on the first attempt).
    pub attempt: u32,
    pub last_error: Option<ClassifiedError>,
}

/// Why a single attempt failed.
///
/// Transport outcomes go through classification and may be retried; a
/// [`PortalError`] raised while building the attempt ends the call as is.
#[derive(Debug)]
pub enum AttemptError {
    Transport(TransportError),
    Fatal(PortalError),
}

impl From<TransportError> for AttemptError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<PortalError> for AttemptError {
    fn from(e: PortalError) -> Self {
        Self::Fatal(e)
    }
}

/// Runs one operation under an [`OperationPolicy`].
#[derive(Clone)]
pub struct InvocationExecutor {
    auth: Arc<AuthCoordinator>,
}

impl InvocationExecutor {
    pub fn new(auth: Arc<AuthCoordinator>) -> Self {
        Self { auth }
    }

    pub fn auth(&self) -> &Arc<AuthCoordinator> {
        &self.auth
    }

    /// Call `op` until it succeeds, fails terminally, or the retry budget of
    /// `policy` is spent.
    ///
    /// `ctx` decides whether a 401 may still trigger a refresh; pass the same
    /// context for every endpoint of one logical call. `cancel` is checked
    /// before every attempt and aborts a pending backoff sleep. An attempt
    /// already on the wire is never interrupted.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        policy: &OperationPolicy,
        ctx: &mut AuthContext,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, AttemptError>>,
    {
        let mut state = AttemptState::default();

        loop {
            if cancel.is_cancelled() {
                debug!("[Executor] Cancelled before attempt {}", state.attempt);
                return Err(PortalError::Cancelled);
            }

            let error = match op().await {
                Ok(value) => {
                    if state.attempt > 0 || state.last_error.is_some() {
                        info!("[Executor] Succeeded after {} retries", state.attempt);
                    }
                    return Ok(value);
                }
                Err(AttemptError::Transport(outcome)) => classify(&outcome, policy),
                Err(AttemptError::Fatal(e)) => {
                    warn!("[Executor] Attempt could not be built: {}", e);
                    return Err(e);
                }
            };
            debug!(
                "[Executor] Attempt failed ({}/{}): {}",
                state.attempt, policy.max_retries, error
            );

            if error.kind == ErrorKind::AuthExpired && ctx.can_refresh() {
                info!("[Executor] Access token expired, attempting refresh");
                if self.auth.refresh_if_needed(ctx).await {
                    // The refreshed pass does not consume the retry budget
                    state.last_error = Some(error);
                    continue;
                }
            }

            if error.retryable && state.attempt < policy.max_retries {
                state.attempt += 1;
                let delay = policy.backoff_delay(state.attempt);
                info!(
                    "[Executor] Retrying in {}ms ({}/{}) after {}",
                    delay.as_millis(),
                    state.attempt,
                    policy.max_retries,
                    error.kind
                );
                state.last_error = Some(error);

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("[Executor] Cancelled during backoff");
                        return Err(PortalError::Cancelled);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                continue;
            }

            if error.kind == ErrorKind::AuthExpired && ctx.refresh_failed() {
                self.auth.logout(ctx).await;
            }

            warn!(
                "[Executor] Giving up after {} retries: {}",
                state.attempt, error
            );
            return Err(error.into());
        }
    }
}
