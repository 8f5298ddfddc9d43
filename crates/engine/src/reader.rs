use std::fs::{self, File};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use std::time::UNIX_EPOCH;

use relay_core::UsageRecord;

use crate::parser::parse_usage_line;
use crate::state::OffsetEntry;

/// Result of scanning one log file: the records parsed from its newly
/// appended region and the offset entry to commit on success. `entry: None`
/// means the file is gone and its entry should be garbage-collected.
#[derive(Debug, Default)]
pub struct FileScan {
    pub records: Vec<UsageRecord>,
    pub entry: Option<OffsetEntry>,
    pub rejected_lines: usize,
}

fn mtime_millis(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}

/// Read only the tail appended since the prior entry. Truncation and
/// rotation are detected by a shrinking size and trigger a rescan from
/// offset zero; an unchanged (size, mtime) pair skips the file entirely.
pub fn scan_file(path: &Path, prior: Option<&OffsetEntry>) -> FileScan {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => return FileScan::default(),
    };
    let size = metadata.len();
    let mtime = mtime_millis(&metadata);

    if let Some(prior) = prior {
        if prior.size == size && prior.mtime == mtime {
            return FileScan {
                records: Vec::new(),
                entry: Some(prior.clone()),
                rejected_lines: 0,
            };
        }
    }

    let start = match prior {
        Some(prior) if size < prior.size => {
            tracing::debug!(path = %path.display(), "file shrank, rescanning from start");
            0
        }
        Some(prior) => prior.offset,
        None => 0,
    };

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "cannot open log file");
            return FileScan {
                records: Vec::new(),
                entry: prior.cloned(),
                rejected_lines: 0,
            };
        }
    };
    if let Err(err) = file.seek(SeekFrom::Start(start)) {
        tracing::warn!(path = %path.display(), error = %err, "cannot seek log file");
        return FileScan {
            records: Vec::new(),
            entry: prior.cloned(),
            rejected_lines: 0,
        };
    }

    let mut reader = BufReader::new(file);
    let mut buf = String::new();
    let mut bytes_read = 0u64;
    let mut records = Vec::new();
    let mut rejected_lines = 0usize;

    loop {
        match reader.read_line(&mut buf) {
            Ok(0) => break,
            Ok(bytes) => {
                bytes_read = bytes_read.saturating_add(bytes as u64);
                let line = buf.trim_end_matches(&['\n', '\r'][..]);
                match parse_usage_line(line) {
                    Some(record) => records.push(record),
                    None => rejected_lines += 1,
                }
                buf.clear();
            }
            Err(err) => {
                // Stop here; the committed offset covers only cleanly read
                // lines, so the bad region is retried next run.
                tracing::warn!(path = %path.display(), error = %err, "read error in log file");
                break;
            }
        }
    }

    let end = start.saturating_add(bytes_read);
    FileScan {
        records,
        entry: Some(OffsetEntry {
            offset: end,
            size: end,
            mtime,
        }),
        rejected_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn usage_line(ts: &str, message_id: &str, input: u64) -> String {
        format!(
            r#"{{"timestamp":"{ts}","message":{{"id":"{message_id}","usage":{{"input_tokens":{input},"output_tokens":1}}}}}}"#
        )
    }

    #[test]
    fn cold_scan_reads_every_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        let mut file = File::create(&path).expect("create");
        for index in 0..3 {
            writeln!(
                file,
                "{}",
                usage_line("2025-06-10T12:00:00Z", &format!("msg_{index}"), index)
            )
            .expect("write");
        }
        drop(file);

        let scan = scan_file(&path, None);
        assert_eq!(scan.records.len(), 3);
        let entry = scan.entry.expect("entry");
        assert_eq!(entry.offset, fs::metadata(&path).expect("stat").len());
        assert_eq!(entry.offset, entry.size);
    }

    #[test]
    fn unchanged_file_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        fs::write(&path, usage_line("2025-06-10T12:00:00Z", "msg_0", 1) + "\n").expect("write");

        let first = scan_file(&path, None);
        let entry = first.entry.expect("entry");
        let second = scan_file(&path, Some(&entry));
        assert!(second.records.is_empty());
        assert_eq!(second.entry, Some(entry));
    }

    #[test]
    fn appended_lines_are_read_incrementally() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        fs::write(&path, usage_line("2025-06-10T12:00:00Z", "msg_0", 1) + "\n").expect("write");
        let entry = scan_file(&path, None).entry.expect("entry");

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .expect("open");
        writeln!(file, "{}", usage_line("2025-06-10T12:00:05Z", "msg_1", 2)).expect("append");
        drop(file);

        let scan = scan_file(&path, Some(&entry));
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.records[0].tokens.input_tokens, 2);
        assert_eq!(
            scan.entry.expect("entry").offset,
            fs::metadata(&path).expect("stat").len()
        );
    }

    #[test]
    fn shrunken_file_rescans_from_start() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        let long = usage_line("2025-06-10T12:00:00Z", "msg_0", 1) + "\n"
            + &usage_line("2025-06-10T12:00:01Z", "msg_1", 2)
            + "\n";
        fs::write(&path, &long).expect("write");
        let entry = scan_file(&path, None).entry.expect("entry");

        fs::write(&path, usage_line("2025-06-10T12:01:00Z", "msg_2", 3).to_string() + "\n")
            .expect("truncate");
        let scan = scan_file(&path, Some(&entry));
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.records[0].tokens.input_tokens, 3);
    }

    #[test]
    fn missing_file_drops_its_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gone.jsonl");
        let scan = scan_file(
            &path,
            Some(&OffsetEntry {
                offset: 10,
                size: 10,
                mtime: 1,
            }),
        );
        assert!(scan.records.is_empty());
        assert!(scan.entry.is_none());
    }

    #[test]
    fn unparseable_lines_are_skipped_but_offset_advances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        let contents = format!(
            "not json at all\n{}\n{{\"half\": \n",
            usage_line("2025-06-10T12:00:00Z", "msg_0", 1)
        );
        fs::write(&path, &contents).expect("write");

        let scan = scan_file(&path, None);
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.rejected_lines, 2);
        assert_eq!(scan.entry.expect("entry").offset, contents.len() as u64);
    }

    // The host writer emits whole lines; a line caught mid-write is rejected
    // this run and the next run starts past it, so its completion is lost.
    #[test]
    fn partial_final_line_is_lost_once_completed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        let complete = usage_line("2025-06-10T12:00:00Z", "msg_0", 1);
        let partial = r#"{"timestamp":"2025-06-10T12:00:01Z","message":{"usage":{"input"#;
        fs::write(&path, format!("{complete}\n{partial}")).expect("write");

        let scan = scan_file(&path, None);
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.rejected_lines, 1);
        let entry = scan.entry.expect("entry");

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .expect("open");
        write!(file, "_tokens\":1,\"output_tokens\":1}}}}\n").expect("append");
        drop(file);

        let scan = scan_file(&path, Some(&entry));
        assert!(scan.records.is_empty());
        assert_eq!(scan.rejected_lines, 1);
    }

    #[test]
    fn invalid_utf8_stops_scan_without_advancing_past_clean_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        let clean = usage_line("2025-06-10T12:00:00Z", "msg_0", 1);
        let mut bytes = clean.clone().into_bytes();
        bytes.push(b'\n');
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        fs::write(&path, bytes).expect("write");

        let scan = scan_file(&path, None);
        assert_eq!(scan.records.len(), 1);
        let entry = scan.entry.expect("entry");
        assert_eq!(entry.offset, (clean.len() + 1) as u64);
    }
}
