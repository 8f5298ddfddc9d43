mod buffer;
mod config;
mod dedup;
mod deliver;
mod diag;
mod discover;
mod error;
mod gate;
mod parser;
mod paths;
mod reader;
mod run;
mod state;

pub use buffer::BufferStore;
pub use config::{RelayConfig, load_config};
pub use dedup::{DedupIndex, RETENTION_DAYS};
pub use deliver::{
    BATCH_SIZE, DeliverError, DeliveryOutcome, HttpTransport, REQUEST_TIMEOUT, SEND_BUDGET,
    Transport, send_batches,
};
pub use diag::{DEBUG_ENV, init_debug_log};
pub use discover::discover_log_files;
pub use error::{EngineError, Result};
pub use gate::{LOCK_STALE_AFTER, RunLock, THROTTLE_WINDOW, throttled};
pub use parser::parse_usage_line;
pub use paths::{RelayPaths, default_claude_home, default_log_roots};
pub use reader::{FileScan, scan_file};
pub use run::{RunOptions, RunOutcome, run_once};
pub use state::{OffsetEntry, SCHEMA_VERSION, ScanState, StateStore};
