use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A run within this window of the previous successful run exits early.
pub const THROTTLE_WINDOW: Duration = Duration::from_secs(30);
/// A lock older than this is presumed abandoned by a crashed process.
pub const LOCK_STALE_AFTER: Duration = Duration::from_secs(10);
const ACQUIRE_BUDGET: Duration = Duration::from_secs(1);
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// The throttle is an optimization, not a lock: it only consults the last
/// committed run timestamp.
pub fn throttled(last_run_millis: i64, now_millis: i64, window: Duration) -> bool {
    let elapsed = now_millis.saturating_sub(last_run_millis);
    elapsed >= 0 && (elapsed as u128) < window.as_millis()
}

#[derive(Debug, Serialize, Deserialize)]
struct LockClaim {
    pid: u32,
    timestamp: i64,
}

/// Exclusive-create lock file serializing concurrent triggers on one host.
/// Dropping the guard releases the lock; a crashed holder is reclaimed by
/// contenders via the staleness window.
pub struct RunLock {
    path: PathBuf,
    held: bool,
}

impl RunLock {
    /// Try to claim the lock within a short budget. `None` means another
    /// process holds it; per the coordination semantic that is a silent,
    /// successful exit for the caller.
    pub fn acquire(path: &Path) -> Option<RunLock> {
        let deadline = Instant::now() + ACQUIRE_BUDGET;
        loop {
            match Self::try_claim(path) {
                Ok(true) => {
                    return Some(RunLock {
                        path: path.to_path_buf(),
                        held: true,
                    });
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "lock file unavailable");
                    return None;
                }
            }
            if Self::reclaim_if_stale(path) {
                continue;
            }
            if Instant::now() >= deadline {
                tracing::debug!("lock busy past acquisition budget");
                return None;
            }
            std::thread::sleep(RETRY_INTERVAL);
        }
    }

    fn try_claim(path: &Path) -> std::io::Result<bool> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(err),
        };
        let claim = LockClaim {
            pid: std::process::id(),
            timestamp: Utc::now().timestamp_millis(),
        };
        let json = serde_json::to_string(&claim).unwrap_or_default();
        file.write_all(json.as_bytes())?;
        Ok(true)
    }

    /// A claim older than the staleness window is deleted so a crashed
    /// holder cannot wedge every later run. An unreadable claim is judged by
    /// the lock file's age instead, so a holder caught between creating the
    /// file and writing the claim is not swept away.
    fn reclaim_if_stale(path: &Path) -> bool {
        let stale = match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<LockClaim>(&contents) {
                Ok(claim) => {
                    let age = Utc::now().timestamp_millis().saturating_sub(claim.timestamp);
                    age > LOCK_STALE_AFTER.as_millis() as i64
                }
                Err(_) => file_older_than(path, LOCK_STALE_AFTER),
            },
            Err(err) if err.kind() == ErrorKind::NotFound => return false,
            Err(_) => false,
        };
        if stale {
            tracing::debug!(path = %path.display(), "reclaiming stale lock");
            let _ = fs::remove_file(path);
        }
        stale
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.held {
            self.held = false;
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

fn file_older_than(path: &Path, window: Duration) -> bool {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age > window)
        .unwrap_or(false)
}
