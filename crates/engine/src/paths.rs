use std::path::{Path, PathBuf};

const STATE_FILE: &str = "stats-state.json";
const BUFFER_FILE: &str = "stats-state.buffer.json";
const LOCK_FILE: &str = "stats.lock";
const CONFIG_FILE: &str = "stats-config.json";
const DEBUG_LOG_FILE: &str = "stats-debug.log";

/// Resolved locations of everything the engine persists under the Claude
/// home directory.
#[derive(Debug, Clone)]
pub struct RelayPaths {
    home: PathBuf,
}

impl RelayPaths {
    pub fn new(home: PathBuf) -> Self {
        Self { home }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn state_file(&self) -> PathBuf {
        self.home.join(STATE_FILE)
    }

    pub fn buffer_file(&self) -> PathBuf {
        self.home.join(BUFFER_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.home.join(LOCK_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }

    pub fn debug_log_file(&self) -> PathBuf {
        self.home.join(DEBUG_LOG_FILE)
    }

    pub fn debug_log_rotated_file(&self) -> PathBuf {
        self.home.join(format!("{DEBUG_LOG_FILE}.old"))
    }
}

pub fn default_claude_home() -> PathBuf {
    if let Ok(path) = std::env::var("CLAUDE_STATS_HOME") {
        return PathBuf::from(path);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".claude");
    }
    PathBuf::from(".claude")
}

/// Root directories that may hold a `projects/` tree of session logs.
/// `CLAUDE_STATS_LOG_ROOTS` (comma-separated) overrides the well-known pair.
pub fn default_log_roots() -> Vec<PathBuf> {
    if let Ok(roots) = std::env::var("CLAUDE_STATS_LOG_ROOTS") {
        return roots
            .split(',')
            .map(str::trim)
            .filter(|root| !root.is_empty())
            .map(PathBuf::from)
            .collect();
    }
    let mut roots = Vec::new();
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        roots.push(PathBuf::from(xdg).join("claude"));
    }
    if let Ok(home) = std::env::var("HOME") {
        roots.push(PathBuf::from(home).join(".claude"));
    }
    roots
}
