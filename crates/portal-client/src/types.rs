//! Types for portal API requests and responses.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Prompt Types
// ─────────────────────────────────────────────────────────────────────────────

/// A prompt from the prompt library.
///
/// Only the fields the client relies on are typed; everything else the server
/// sends is kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One historical version of a prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptVersion {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Filters for listing prompts.
#[derive(Debug, Clone, Default)]
pub struct PromptFilters {
    pub category: Option<String>,
    pub tags: Vec<String>,
}

/// Prompts changed since the last sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncUpdates {
    pub prompts: Vec<Prompt>,
    /// Server timestamp in milliseconds; use as `since` for the next sync.
    pub timestamp: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Usage Types
// ─────────────────────────────────────────────────────────────────────────────

/// Body for the per-prompt usage endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptUsageRequest {
    pub version_id: String,
    pub context: String,
}

/// Body for the legacy usage endpoint, which takes the prompt in the body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPromptUsageRequest {
    pub prompt_id: String,
    pub version_id: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageRequest {
    pub token_count: u64,
    pub model_id: String,
    pub context: String,
}

/// Response from incrementing the launch counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchCountResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<LaunchCountData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchCountData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_code_launch_count: Option<i64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Envelopes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct PromptsResponse {
    #[serde(default)]
    pub prompts: Vec<Prompt>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PromptDetailResponse {
    #[serde(default)]
    pub prompt: Option<Prompt>,
}

/// The versions endpoint answers either `{"versions": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum VersionsResponse {
    Wrapped { versions: Vec<PromptVersion> },
    Bare(Vec<PromptVersion>),
}

impl VersionsResponse {
    pub(crate) fn into_versions(self) -> Vec<PromptVersion> {
        match self {
            Self::Wrapped { versions } | Self::Bare(versions) => versions,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SyncResponse {
    #[serde(default)]
    pub prompts: Vec<Prompt>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentUserResponse {
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}
