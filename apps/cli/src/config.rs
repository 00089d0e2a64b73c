use std::time::Duration;

use appgenius_portal_client::DEFAULT_TIMEOUT_SECS;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

pub struct Config {
    pub api_url: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = non_empty("PORTAL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let timeout_ms: u64 = non_empty("PORTAL_REQUEST_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS * 1000);

        Self {
            api_url,
            api_key: non_empty("PORTAL_API_KEY"),
            access_token: non_empty("PORTAL_ACCESS_TOKEN"),
            refresh_token: non_empty("PORTAL_REFRESH_TOKEN"),
            request_timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.api_key.is_none());
        assert!(config.access_token.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_reads_values_and_ignores_blank_ones() {
        let config = config(&[
            ("PORTAL_API_URL", "https://portal.example.com/api"),
            ("PORTAL_API_KEY", "   "),
            ("PORTAL_ACCESS_TOKEN", "tok"),
            ("PORTAL_REQUEST_TIMEOUT_MS", "2500"),
        ]);
        assert_eq!(config.api_url, "https://portal.example.com/api");
        assert!(config.api_key.is_none());
        assert_eq!(config.access_token.as_deref(), Some("tok"));
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        let config = config(&[("PORTAL_REQUEST_TIMEOUT_MS", "soon")]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
