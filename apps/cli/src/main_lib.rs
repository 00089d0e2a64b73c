use std::sync::Arc;

use appgenius_portal_client::{HttpTransport, PortalApiClient};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::credentials::{ConsoleNotifier, EnvCredentials};

pub fn init_tracing() {
    let log_format = std::env::var("PORTAL_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output stays parseable
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

pub fn build_client(config: &Config) -> anyhow::Result<PortalApiClient> {
    let transport = Arc::new(HttpTransport::new(config.request_timeout)?);
    let credentials = Arc::new(EnvCredentials::new(config)?);
    tracing::debug!("Portal API at {}", config.api_url);
    Ok(PortalApiClient::new(
        &config.api_url,
        transport,
        credentials,
        Arc::new(ConsoleNotifier),
    ))
}
