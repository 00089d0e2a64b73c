//! Resilient client for the AppGenius prompt portal API.
//!
//! Every remote call goes through the same pipeline:
//!
//! - [`classifier`] maps a raw transport outcome to a [`ClassifiedError`]
//! - [`auth`] attaches credentials and performs at most one refresh per call
//! - [`executor`] retries with bounded exponential backoff and jitter
//! - [`fallback`] walks an ordered list of endpoints, advancing on 404
//! - [`client`] exposes the business operations on top of the chain
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use appgenius_portal_client::{HttpTransport, LogNotificationSink, PortalApiClient, PromptFilters};
//!
//! let transport = Arc::new(HttpTransport::with_default_timeout()?);
//! let client = PortalApiClient::new(
//!     "https://portal.example.com/api",
//!     transport,
//!     credentials,
//!     Arc::new(LogNotificationSink),
//! );
//!
//! let prompts = client.get_prompts(&PromptFilters::default()).await?;
//! ```

pub mod auth;
pub mod classifier;
pub mod client;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod notify;
pub mod policy;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use auth::{AuthContext, AuthCoordinator, CredentialProvider, API_KEY_HEADER};
pub use classifier::classify;
pub use client::PortalApiClient;
pub use error::{ClassifiedError, ErrorKind, PortalError, Result};
pub use executor::{AttemptError, InvocationExecutor};
pub use fallback::{Endpoint, EndpointSpec, FallbackChain, Payload, IDEMPOTENCY_KEY_HEADER};
pub use notify::{LogNotificationSink, Notification, NotificationSink, Severity};
pub use policy::OperationPolicy;
pub use transport::{
    ApiRequest, ApiResponse, HttpTransport, Transport, TransportError, DEFAULT_TIMEOUT_SECS,
};
pub use types::*;

pub use tokio_util::sync::CancellationToken;
