use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Delivery configuration written by the setup CLI. The engine only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    pub username: String,
    pub server_url: String,
    pub enabled: bool,
}

impl RelayConfig {
    /// A config is usable only when explicitly enabled and pointed at a
    /// server. Anything else means the engine exits without doing work.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.server_url.is_empty()
    }
}

/// Returns `None` when the file is absent, unreadable, or malformed; a
/// missing config is the normal "not opted in" state, never an error.
pub fn load_config(path: &Path) -> Option<RelayConfig> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}
