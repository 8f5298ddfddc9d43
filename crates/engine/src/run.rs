use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::buffer::BufferStore;
use crate::dedup::DedupIndex;
use crate::deliver::{DeliveryOutcome, SEND_BUDGET, Transport, send_batches};
use crate::discover::discover_log_files;
use crate::gate::{RunLock, THROTTLE_WINDOW, throttled};
use crate::paths::RelayPaths;
use crate::reader::scan_file;
use crate::state::StateStore;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub throttle_window: Duration,
    pub send_budget: Duration,
    /// Collect and dedup but skip delivery; survivors stay in the buffer.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            throttle_window: THROTTLE_WINDOW,
            send_budget: SEND_BUDGET,
            dry_run: false,
        }
    }
}

/// How one trigger ended. Every variant is a successful process exit; the
/// distinction only matters to the debug log and to tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Throttled,
    LockBusy,
    Completed { sent: usize, buffered: usize },
    Failed,
}

/// One full engine pass: gate, collect, merge, deliver, commit.
pub fn run_once(
    paths: &RelayPaths,
    roots: &[PathBuf],
    transport: &dyn Transport,
    options: &RunOptions,
) -> RunOutcome {
    if let Err(err) = fs::create_dir_all(paths.home()) {
        tracing::warn!(error = %err, "cannot create state directory");
        return RunOutcome::Failed;
    }
    let state_store = StateStore::new(paths.state_file());
    let buffer_store = BufferStore::new(paths.buffer_file());

    let now = Utc::now();
    let last_run = state_store.load().last_run_timestamp;
    if throttled(last_run, now.timestamp_millis(), options.throttle_window) {
        tracing::debug!(last_run, "throttled, exiting");
        return RunOutcome::Throttled;
    }

    let Some(lock) = RunLock::acquire(&paths.lock_file()) else {
        tracing::debug!("lock busy, exiting");
        return RunOutcome::LockBusy;
    };
    let outcome = locked_run(&state_store, &buffer_store, roots, transport, options, now);
    lock.release();
    outcome
}

fn locked_run(
    state_store: &StateStore,
    buffer_store: &BufferStore,
    roots: &[PathBuf],
    transport: &dyn Transport,
    options: &RunOptions,
    now: DateTime<Utc>,
) -> RunOutcome {
    let mut state = state_store.load();
    state.migrate();
    let mut dedup = DedupIndex::from_serialized(&state.recent_hashes);

    let mut fresh = Vec::new();
    let mut offsets = BTreeMap::new();
    let mut files_scanned = 0usize;
    let mut duplicates = 0usize;
    let mut rejected_lines = 0usize;
    for path in discover_log_files(roots) {
        let key = path.to_string_lossy().to_string();
        let scan = scan_file(&path, state.file_offsets.get(&key));
        files_scanned += 1;
        rejected_lines += scan.rejected_lines;
        if let Some(entry) = scan.entry {
            offsets.insert(key, entry);
        }
        for record in scan.records {
            if dedup.contains(&record.day_key(), &record.fingerprint) {
                duplicates += 1;
                continue;
            }
            dedup.insert(&record);
            fresh.push(record);
        }
    }
    // Rebuilding the map garbage-collects entries for files that vanished.
    state.file_offsets = offsets;

    // The buffer is consumed exactly once per run: read, cleared, and only
    // rewritten with whatever survives delivery.
    let buffered = buffer_store.load();
    if let Err(err) = buffer_store.clear() {
        tracing::warn!(error = %err, "cannot clear pending buffer");
    }
    let buffered_in = buffered.len();
    let collected = fresh.len();

    // Buffered first: older data ships before this run's records.
    let mut outgoing = buffered;
    outgoing.append(&mut fresh);

    let outcome = if outgoing.is_empty() {
        DeliveryOutcome {
            sent: 0,
            unsent: Vec::new(),
        }
    } else if options.dry_run {
        DeliveryOutcome {
            sent: 0,
            unsent: outgoing,
        }
    } else {
        send_batches(transport, outgoing, options.send_budget)
    };

    if !outcome.unsent.is_empty() {
        if let Err(err) = buffer_store.replace(&outcome.unsent, now) {
            tracing::warn!(error = %err, "cannot persist pending buffer, aborting commit");
            return RunOutcome::Failed;
        }
    }

    state.last_run_timestamp = now.timestamp_millis();
    dedup.prune(now.date_naive());
    state.recent_hashes = dedup.to_serialized();
    state.last_cleanup = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Err(err) = state_store.commit(&state) {
        tracing::warn!(error = %err, "cannot commit scan state");
        return RunOutcome::Failed;
    }

    tracing::debug!(
        files_scanned,
        collected,
        duplicates,
        rejected_lines,
        buffered_in,
        sent = outcome.sent,
        buffered_out = outcome.unsent.len(),
        "run complete"
    );
    RunOutcome::Completed {
        sent: outcome.sent,
        buffered: outcome.unsent.len(),
    }
}
