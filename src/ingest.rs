use crate::constants::MTIME_SLACK;
use crate::types::{RawLogLine, UniqueHash, UsageRecord};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Caller-owned dedup arena.
///
/// Replaces the hidden module-global "already processed ids" sets of older
/// implementations: the caller decides the lifecycle, typically one cache
/// per aggregation pass, cleared or dropped when the pass ends.
#[derive(Debug, Default)]
pub struct DedupCache {
    seen: HashSet<UniqueHash>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Register a record's identity. Returns false when the identity was
    /// already seen; records without an identity always pass.
    fn admit(&mut self, record: &UsageRecord) -> bool {
        match &record.identity {
            Some(hash) => self.seen.insert(hash.clone()),
            None => true,
        }
    }
}

/// Per-scan diagnostics. Actual I/O failures are reflected here (and
/// logged) instead of being raised; callers can distinguish "zero usage"
/// from "could not read the logs".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Files opened and parsed.
    pub files_scanned: usize,
    /// Files skipped unopened by the mtime staleness heuristic.
    pub files_skipped: usize,
    /// Files that could not be read (permissions, I/O).
    pub files_failed: usize,
    /// Non-empty lines that failed to parse as JSON.
    pub lines_skipped: usize,
}

impl ScanStats {
    pub(crate) fn absorb(&mut self, other: ScanStats) {
        self.files_scanned += other.files_scanned;
        self.files_skipped += other.files_skipped;
        self.files_failed += other.files_failed;
        self.lines_skipped += other.lines_skipped;
    }
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Deduplicated usage records. Ordering is not guaranteed; sort before
    /// any chronology-sensitive processing.
    pub records: Vec<UsageRecord>,
    pub stats: ScanStats,
}

/// Byte-offset resumption point for one log file, owned by the caller and
/// passed back on the next incremental scan. Pure value, no hidden state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCursor {
    pub path: PathBuf,
    pub offset: u64,
    pub mtime: SystemTime,
}

#[derive(Debug, Default)]
pub struct IncrementalScan {
    pub records: Vec<UsageRecord>,
    /// Updated cursors for every file read (or found unchanged) this
    /// scan. Files skipped by the staleness heuristic carry no cursor and
    /// are re-evaluated on the next scan.
    pub cursors: Vec<FileCursor>,
    pub stats: ScanStats,
}

/// Recursively collect every `*.jsonl` file under `root`.
/// A missing or unreadable directory contributes nothing.
pub fn collect_jsonl_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %dir.display(), %err, "skipping unreadable directory");
                continue;
            }
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "jsonl") {
                files.push(path);
            }
        }
    }

    files
}

/// Scan every JSONL file under `root` and return the deduplicated usage
/// records at or after `since` (all records when `since` is `None`).
///
/// Pure read with degraded failure modes throughout: a missing root yields
/// an empty outcome, unreadable files count as zero records, and malformed
/// lines never abort the rest of their file. The time bound is checked
/// before dedup registration, so out-of-window records never pollute the
/// cache.
pub fn scan_usage_records(
    root: &Path,
    since: Option<DateTime<Utc>>,
    cache: &mut DedupCache,
) -> ScanOutcome {
    if !root.exists() {
        debug!(root = %root.display(), "log root does not exist, returning empty scan");
        return ScanOutcome::default();
    }

    let files = collect_jsonl_files(root);
    debug!(root = %root.display(), files = files.len(), "scanning log files");

    // Parse files in parallel, then dedup sequentially: parsing is pure,
    // the cache is not.
    let parsed: Vec<FileScan> = files
        .par_iter()
        .map(|path| scan_file(path, since))
        .collect();

    let mut outcome = ScanOutcome::default();
    for file_scan in parsed {
        outcome.stats.absorb(file_scan.stats);
        for record in file_scan.records {
            if cache.admit(&record) {
                outcome.records.push(record);
            }
        }
    }

    outcome
}

/// Incremental variant of `scan_usage_records`: resumes each file from the
/// byte offset recorded in `cursors` and returns only records appended
/// since, alongside updated cursors.
///
/// Only complete (newline-terminated) lines advance a cursor; a partially
/// written trailing line is left for the next scan instead of being
/// consumed half-parsed.
pub fn scan_incremental(
    root: &Path,
    since: Option<DateTime<Utc>>,
    cursors: &[FileCursor],
    cache: &mut DedupCache,
) -> IncrementalScan {
    if !root.exists() {
        debug!(root = %root.display(), "log root does not exist, returning empty scan");
        return IncrementalScan::default();
    }

    let known: HashMap<&Path, &FileCursor> = cursors
        .iter()
        .map(|cursor| (cursor.path.as_path(), cursor))
        .collect();

    let mut scan = IncrementalScan::default();

    for path in collect_jsonl_files(root) {
        let prior = known.get(path.as_path()).copied();

        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to stat log file");
                scan.stats.files_failed += 1;
                continue;
            }
        };
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        match prior {
            // Nothing appended since the last scan.
            Some(cursor) if cursor.mtime == mtime && cursor.offset == meta.len() => {
                scan.stats.files_skipped += 1;
                scan.cursors.push(cursor.clone());
                continue;
            }
            None if is_stale(mtime, since) => {
                scan.stats.files_skipped += 1;
                continue;
            }
            _ => {}
        }

        // A shrunken file means rotation or truncation; start over.
        let base = match prior {
            Some(cursor) if cursor.offset <= meta.len() => cursor.offset,
            _ => 0,
        };

        match read_from(&path, base) {
            Ok(chunk) => {
                let (complete, consumed) = complete_lines(&chunk);
                let file_scan = scan_lines(complete, since);
                scan.stats.absorb(file_scan.stats);
                scan.stats.files_scanned += 1;
                for record in file_scan.records {
                    if cache.admit(&record) {
                        scan.records.push(record);
                    }
                }
                scan.cursors.push(FileCursor {
                    path,
                    offset: base + consumed,
                    mtime,
                });
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read log file");
                scan.stats.files_failed += 1;
                scan.cursors.push(FileCursor {
                    path,
                    offset: base,
                    mtime,
                });
            }
        }
    }

    scan
}

struct FileScan {
    records: Vec<UsageRecord>,
    stats: ScanStats,
}

fn scan_file(path: &Path, since: Option<DateTime<Utc>>) -> FileScan {
    let mut stats = ScanStats::default();

    // Staleness heuristic: a file last touched more than MTIME_SLACK
    // before the bound cannot contain in-window records. The slack keeps
    // this safe for files appended to long after creation.
    if let Ok(meta) = fs::metadata(path)
        && let Ok(mtime) = meta.modified()
        && is_stale(mtime, since)
    {
        stats.files_skipped = 1;
        return FileScan {
            records: Vec::new(),
            stats,
        };
    }

    match fs::read_to_string(path) {
        Ok(contents) => {
            let mut file_scan = scan_lines(&contents, since);
            file_scan.stats.files_scanned = 1;
            file_scan
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read log file");
            stats.files_failed = 1;
            FileScan {
                records: Vec::new(),
                stats,
            }
        }
    }
}

fn scan_lines(contents: &str, since: Option<DateTime<Utc>>) -> FileScan {
    let mut stats = ScanStats::default();
    let mut records = Vec::new();

    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let raw: RawLogLine = match serde_json::from_str(trimmed) {
            Ok(raw) => raw,
            Err(_) => {
                // Corrupt or partial lines are expected in logs still
                // being written; skip and keep going.
                stats.lines_skipped += 1;
                continue;
            }
        };

        let Some(record) = UsageRecord::from_raw(raw) else {
            continue;
        };

        if let Some(bound) = since
            && record.timestamp < bound
        {
            continue;
        }

        records.push(record);
    }

    FileScan { records, stats }
}

fn is_stale(mtime: SystemTime, since: Option<DateTime<Utc>>) -> bool {
    match since {
        Some(bound) => DateTime::<Utc>::from(mtime) < bound - MTIME_SLACK,
        None => false,
    }
}

fn read_from(path: &Path, offset: u64) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))?;
    }
    let mut chunk = String::new();
    file.read_to_string(&mut chunk)?;
    Ok(chunk)
}

/// Split a chunk at its last newline: everything up to it is complete,
/// the remainder is a line still being written.
fn complete_lines(chunk: &str) -> (&str, u64) {
    match chunk.rfind('\n') {
        Some(pos) => (&chunk[..=pos], (pos + 1) as u64),
        None => ("", 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::TempDir;

    fn assistant_line(ts: &str, msg_id: &str, req_id: &str, input: u64, output: u64) -> String {
        format!(
            r#"{{"type":"assistant","timestamp":"{ts}","requestId":"{req_id}","message":{{"id":"{msg_id}","model":"claude-sonnet-4-20250514","usage":{{"input_tokens":{input},"output_tokens":{output}}}}}}}"#
        )
    }

    fn write_log(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_missing_root_is_empty_not_error() {
        let mut cache = DedupCache::new();
        let outcome = scan_usage_records(Path::new("/nonexistent/claude/logs"), None, &mut cache);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats, ScanStats::default());
    }

    #[test]
    fn test_scan_recurses_and_collects_assistant_records() {
        let tmp = TempDir::new().unwrap();
        write_log(
            &tmp.path().join("project-a"),
            "s1.jsonl",
            &[
                assistant_line("2024-01-15T10:00:00Z", "m1", "r1", 100, 50),
                r#"{"type":"user","timestamp":"2024-01-15T10:01:00Z"}"#.to_string(),
            ],
        );
        write_log(
            &tmp.path().join("project-b/nested"),
            "s2.jsonl",
            &[assistant_line("2024-01-15T11:00:00Z", "m2", "r2", 10, 5)],
        );
        // Non-jsonl files are ignored entirely.
        write_log(
            tmp.path(),
            "notes.txt",
            &[assistant_line("2024-01-15T12:00:00Z", "m3", "r3", 1, 1)],
        );

        let mut cache = DedupCache::new();
        let outcome = scan_usage_records(tmp.path(), None, &mut cache);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.stats.files_scanned, 2);
    }

    #[test]
    fn test_duplicates_counted_once_idless_counted_each() {
        let tmp = TempDir::new().unwrap();
        let dup = assistant_line("2024-01-15T10:00:00Z", "m1", "r1", 100, 50);
        let idless = r#"{"type":"assistant","timestamp":"2024-01-15T10:02:00Z","message":{"model":"x","usage":{"input_tokens":7}}}"#.to_string();
        write_log(
            tmp.path(),
            "a.jsonl",
            &[dup.clone(), dup.clone(), idless.clone(), idless],
        );
        // Same entry mirrored into a second file.
        write_log(tmp.path(), "b.jsonl", &[dup]);

        let mut cache = DedupCache::new();
        let outcome = scan_usage_records(tmp.path(), None, &mut cache);
        // One deduplicated record plus two identity-less ones.
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_repeated_scans_yield_identical_results() {
        let tmp = TempDir::new().unwrap();
        write_log(
            tmp.path(),
            "a.jsonl",
            &[
                assistant_line("2024-01-15T10:00:00Z", "m1", "r1", 100, 50),
                assistant_line("2024-01-15T10:05:00Z", "m2", "r2", 20, 10),
            ],
        );

        let run = || {
            let mut cache = DedupCache::new();
            scan_usage_records(tmp.path(), None, &mut cache).records
        };
        let first = run();
        let second = run();
        assert_eq!(first.len(), 2);
        assert_eq!(first.len(), second.len());
        let total = |records: &[UsageRecord]| {
            records.iter().map(|r| r.tokens.headline()).sum::<u64>()
        };
        assert_eq!(total(&first), total(&second));
    }

    #[test]
    fn test_lower_bound_filters_before_dedup_registration() {
        let tmp = TempDir::new().unwrap();
        write_log(
            tmp.path(),
            "a.jsonl",
            &[
                assistant_line("2024-01-15T08:00:00Z", "m1", "r1", 100, 0),
                assistant_line("2024-01-15T12:00:00Z", "m2", "r2", 200, 0),
            ],
        );

        let bound = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let mut cache = DedupCache::new();
        let outcome = scan_usage_records(tmp.path(), Some(bound), &mut cache);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].tokens.input_tokens, 200);
        // The out-of-window record never reached the cache.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_malformed_lines_skip_without_aborting_file() {
        let tmp = TempDir::new().unwrap();
        write_log(
            tmp.path(),
            "a.jsonl",
            &[
                assistant_line("2024-01-15T10:00:00Z", "m1", "r1", 100, 50),
                "{not valid json".to_string(),
                assistant_line("2024-01-15T10:05:00Z", "m2", "r2", 20, 10),
            ],
        );

        let mut cache = DedupCache::new();
        let outcome = scan_usage_records(tmp.path(), None, &mut cache);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.stats.lines_skipped, 1);
    }

    #[test]
    fn test_incremental_scan_resumes_from_cursor() {
        let tmp = TempDir::new().unwrap();
        let path = write_log(
            tmp.path(),
            "a.jsonl",
            &[assistant_line("2024-01-15T10:00:00Z", "m1", "r1", 100, 0)],
        );

        let mut cache = DedupCache::new();
        let first = scan_incremental(tmp.path(), None, &[], &mut cache);
        assert_eq!(first.records.len(), 1);
        assert_eq!(first.cursors.len(), 1);

        // Append one more entry and rescan with the returned cursors.
        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(
            file,
            "{}",
            assistant_line("2024-01-15T10:10:00Z", "m2", "r2", 30, 0)
        )
        .unwrap();

        let second = scan_incremental(tmp.path(), None, &first.cursors, &mut cache);
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].tokens.input_tokens, 30);
    }

    #[test]
    fn test_incremental_scan_leaves_partial_trailing_line() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.jsonl");
        let complete = assistant_line("2024-01-15T10:00:00Z", "m1", "r1", 100, 0);
        let partial = r#"{"type":"assistant","timestamp":"2024-01-15T10:1"#;
        fs::write(&path, format!("{complete}\n{partial}")).unwrap();

        let mut cache = DedupCache::new();
        let scan = scan_incremental(tmp.path(), None, &[], &mut cache);
        assert_eq!(scan.records.len(), 1);
        // Cursor stops at the newline; the partial tail is not consumed.
        assert_eq!(scan.cursors[0].offset, (complete.len() + 1) as u64);
        assert_eq!(scan.stats.lines_skipped, 0);
    }

    #[test]
    fn test_incremental_scan_unchanged_file_skipped() {
        let tmp = TempDir::new().unwrap();
        write_log(
            tmp.path(),
            "a.jsonl",
            &[assistant_line("2024-01-15T10:00:00Z", "m1", "r1", 100, 0)],
        );

        let mut cache = DedupCache::new();
        let first = scan_incremental(tmp.path(), None, &[], &mut cache);
        let second = scan_incremental(tmp.path(), None, &first.cursors, &mut cache);
        assert!(second.records.is_empty());
        assert_eq!(second.stats.files_skipped, 1);
        assert_eq!(second.cursors, first.cursors);
    }

    #[test]
    fn test_dedup_cache_clear() {
        let mut cache = DedupCache::new();
        let record = UsageRecord::from_line(&assistant_line(
            "2024-01-15T10:00:00Z",
            "m1",
            "r1",
            1,
            1,
        ))
        .unwrap();
        assert!(cache.admit(&record));
        assert!(!cache.admit(&record));
        cache.clear();
        assert!(cache.admit(&record));
    }
}
