use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Token counters for one host-model interaction. Cache counters default to
/// zero because older writers omit them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
}

impl TokenCounts {
    pub fn total(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_creation_tokens)
            .saturating_add(self.cache_read_tokens)
    }
}

/// One parsed, fingerprinted observation of a host-model interaction.
/// Identity is the fingerprint; records are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Normalized to UTC RFC 3339 with millisecond precision.
    pub timestamp: String,
    #[serde(flatten)]
    pub tokens: TokenCounts,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "interactionHash")]
    pub fingerprint: String,
}

impl UsageRecord {
    /// UTC calendar date bucket used to scope the dedup index.
    pub fn day_key(&self) -> String {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc).format("%Y-%m-%d").to_string())
            .unwrap_or_else(|_| self.timestamp.chars().take(10).collect())
    }
}

/// SHA-256 over `timestamp ‖ message_id ‖ request_id` as they appear in the
/// log line; absent fields contribute the empty string. Changing this digest
/// is a breaking change to dedup.
pub fn interaction_fingerprint(
    timestamp: &str,
    message_id: Option<&str>,
    request_id: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(message_id.unwrap_or_default().as_bytes());
    hasher.update(request_id.unwrap_or_default().as_bytes());
    hex_digest(&hasher.finalize())
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut out, "{:02x}", byte);
    }
    out
}
