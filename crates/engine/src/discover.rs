use std::path::{Path, PathBuf};

use walkdir::WalkDir;

fn is_session_log(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|value| value.to_str()),
        Some("jsonl")
    )
}

/// Collect every session log under `<root>/projects/` for each root whose
/// `projects/` directory exists. Paths come back sorted so scan order, and
/// therefore send order, is stable between runs.
pub fn discover_log_files(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in roots {
        let projects = root.join("projects");
        if !projects.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&projects).follow_links(false).into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && is_session_log(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}
