use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// Major version of the persisted scan-state schema.
pub const SCHEMA_VERSION: u64 = 4;

/// Byte position reached in one tracked log file, with the size and mtime
/// observed when it was committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OffsetEntry {
    pub offset: u64,
    pub size: u64,
    /// Epoch milliseconds of the file's modification time.
    pub mtime: i64,
}

/// The canonical persisted document: schema version, run bookkeeping, file
/// offsets, and the serialized dedup index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanState {
    /// Absent in pre-1 documents; field-level default keeps it 0 there so
    /// migration sees the document as old.
    #[serde(default, deserialize_with = "version_major")]
    pub version: u64,
    pub last_cleanup: String,
    pub last_run_timestamp: i64,
    pub file_offsets: BTreeMap<String, OffsetEntry>,
    pub recent_hashes: BTreeMap<String, Vec<String>>,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            last_cleanup: String::new(),
            last_run_timestamp: 0,
            file_offsets: BTreeMap::new(),
            recent_hashes: BTreeMap::new(),
        }
    }
}

impl ScanState {
    /// Raise older documents to the current schema. Absent sub-fields were
    /// already filled with defaults during deserialization, so migration
    /// reduces to stamping the version; newer majors are left untouched.
    pub fn migrate(&mut self) {
        if self.version < SCHEMA_VERSION {
            tracing::debug!(from = self.version, to = SCHEMA_VERSION, "migrating scan state");
            self.version = SCHEMA_VERSION;
        }
    }
}

/// Early releases persisted the version as a display string ("3.1.0"). The
/// comparison must be numeric on the major component, so both forms decode
/// to the major number.
fn version_major<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Version {
        Number(u64),
        Text(String),
    }
    Ok(match Version::deserialize(deserializer)? {
        Version::Number(value) => value,
        Version::Text(text) => text
            .split('.')
            .next()
            .and_then(|major| major.trim().parse().ok())
            .unwrap_or(0),
    })
}

/// Serialize to a sibling temp file, then rename over the canonical path.
/// The rename is the commit point.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, json)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// An absent or corrupt state file falls back to defaults. The cost is a
    /// one-time rescan; the server is idempotent on fingerprints.
    pub fn load(&self) -> ScanState {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return ScanState::default(),
        };
        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(error = %err, "scan state unreadable, resetting to defaults");
                ScanState::default()
            }
        }
    }

    pub fn commit(&self, state: &ScanState) -> Result<()> {
        write_json_atomic(&self.path, state)
    }
}
