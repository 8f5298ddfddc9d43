use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::paths::RelayPaths;

/// Diagnostics are off unless this variable is set; its value may carry
/// tracing filter directives (`relay_engine=debug`), with `1`/`true`
/// meaning everything at debug.
pub const DEBUG_ENV: &str = "CLAUDE_STATS_DEBUG";

const ROTATE_BYTES: u64 = 10 * 1024 * 1024;

/// Install the file-backed debug subscriber when the gating variable is set.
/// The engine never writes to stdout or stderr; this log is the only
/// diagnostic channel.
pub fn init_debug_log(paths: &RelayPaths) {
    let Ok(value) = std::env::var(DEBUG_ENV) else {
        return;
    };
    if value.is_empty() {
        return;
    }
    let _ = fs::create_dir_all(paths.home());
    let log_path = paths.debug_log_file();
    rotate_if_oversized(&log_path, &paths.debug_log_rotated_file(), ROTATE_BYTES);
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) else {
        return;
    };
    let filter = match value.as_str() {
        "1" | "true" => EnvFilter::new("debug"),
        directives => EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("debug")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .try_init();
}

fn rotate_if_oversized(path: &Path, rotated: &Path, max_bytes: u64) -> bool {
    let oversized = fs::metadata(path).map(|meta| meta.len() >= max_bytes).unwrap_or(false);
    if oversized {
        let _ = fs::rename(path, rotated);
    }
    oversized
}
