use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use relay_core::UsageRecord;

use crate::error::Result;
use crate::state::write_json_atomic;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PendingBuffer {
    last_attempt: String,
    records: Vec<UsageRecord>,
}

/// Durable queue of records that were collected but not yet delivered. One
/// buffer file per host; the orchestrator reads it once per run and clears
/// it before doing anything else with its contents.
pub struct BufferStore {
    path: PathBuf,
}

impl BufferStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Corrupt buffer contents are discarded; the loss is bounded by one
    /// run's worth of records.
    pub fn load(&self) -> Vec<UsageRecord> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str::<PendingBuffer>(&contents) {
            Ok(buffer) => buffer.records,
            Err(err) => {
                tracing::warn!(error = %err, "pending buffer unreadable, discarding");
                Vec::new()
            }
        }
    }

    pub fn replace(&self, records: &[UsageRecord], now: DateTime<Utc>) -> Result<()> {
        let buffer = PendingBuffer {
            last_attempt: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            records: records.to_vec(),
        };
        write_json_atomic(&self.path, &buffer)
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
