//! Append-only JSONL log
//!
//! One normalized record per line, no wrapping array, no separators. The
//! writer only ever opens the file in append mode; the reader tolerates
//! corrupt lines so a single hand edit cannot hide the rest of the log.

use crate::error::{ensure_parent_dir, StoreError, StoreResult};
use sat_record::{normalize, IndicatorRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

/// A line that could not be parsed during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedLine {
    /// 1-based line number
    pub line_no: usize,
    /// Parser message
    pub reason: String,
}

/// Result of reading a log
#[derive(Debug, Clone, Default)]
pub struct LogScan {
    /// Records in file order
    pub records: Vec<IndicatorRecord>,
    /// Lines that were not a JSON object
    pub skipped: Vec<SkippedLine>,
}

/// Handle on one append-only log file
///
/// Clones share the same writer lock, so every append made through any
/// clone is serialized within the process.
#[derive(Debug, Clone)]
pub struct JsonlLog {
    path: PathBuf,
    writer: Arc<Mutex<()>>,
}

impl JsonlLog {
    /// Create handle for path (nothing is touched on disk yet)
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Log file path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one value as one line
    ///
    /// Parent directories are created first. The line is written with a
    /// single append-mode write. A log whose last line lacks its newline
    /// gets one first; a failed write is truncated back to the previous
    /// length.
    ///
    /// # Errors
    /// - `StoreError::Serialize` if the value cannot be encoded
    /// - `StoreError::CreateDir` / `StoreError::Write` on I/O failure
    pub async fn append<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<u64> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');

        let _guard = self.writer.lock().await;
        ensure_parent_dir(&self.path).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::write(&self.path, e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| StoreError::write(&self.path, e))?
            .len();
        let terminated = len == 0
            || ends_with_newline(&mut file, len)
                .await
                .map_err(|e| StoreError::read(&self.path, e))?;
        if !terminated {
            line.insert(0, b'\n');
        }

        let written = async {
            file.write_all(&line).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            if let Err(trunc) = file.set_len(len).await {
                tracing::error!(
                    path = %self.path.display(),
                    error = %trunc,
                    "cannot truncate partial log line"
                );
            }
            return Err(StoreError::write(&self.path, e));
        }

        tracing::debug!(path = %self.path.display(), bytes = line.len(), "appended log line");
        Ok(line.len() as u64)
    }

    /// Read every record, skipping unparseable lines
    ///
    /// A missing file reads as an empty log. Parsed lines pass through the
    /// normalizer so hand-edited entries still come back in canonical shape.
    ///
    /// # Errors
    /// `StoreError::Read` for failures other than not-found.
    pub async fn scan(&self) -> StoreResult<LogScan> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LogScan::default()),
            Err(e) => return Err(StoreError::read(&self.path, e)),
        };

        let scan = parse_lines(&bytes);
        if !scan.skipped.is_empty() {
            tracing::warn!(
                path = %self.path.display(),
                skipped = scan.skipped.len(),
                "log contains unparseable lines"
            );
        }
        Ok(scan)
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(line.len());
    let end = line.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &line[start..end]
}

async fn ends_with_newline(file: &mut tokio::fs::File, len: u64) -> std::io::Result<bool> {
    file.seek(SeekFrom::Start(len - 1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

/// Parse JSONL bytes, one record per non-blank line
///
/// Lines are checked independently: invalid UTF-8, invalid JSON and JSON
/// that is not an object are reported as skipped.
#[must_use]
pub fn parse_lines(bytes: impl AsRef<[u8]>) -> LogScan {
    let mut scan = LogScan::default();
    for (idx, line) in bytes.as_ref().split(|b| *b == b'\n').enumerate() {
        let line = trim_line(line);
        if line.is_empty() {
            continue;
        }
        let reason = match serde_json::from_slice::<serde_json::Value>(line) {
            Ok(value) if value.is_object() => {
                scan.records.push(normalize(&value));
                continue;
            }
            Ok(_) => "not a JSON object".to_string(),
            Err(e) => e.to_string(),
        };
        scan.skipped.push(SkippedLine {
            line_no: idx + 1,
            reason,
        });
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_lines_skips_corrupt_and_blank() {
        let text = concat!(
            "{\"createdAt\":\"2024-01-01T00:00:00Z\",\"what\":[\"a\"]}\n",
            "\n",
            "{not json\n",
            "{\"createdAt\":\"2024-01-02T00:00:00Z\",\"who\":\"b\"}\n",
        );

        let scan = parse_lines(text);
        assert_eq!(scan.records.len(), 2);
        assert_eq!(scan.records[1].who, vec!["b"]);
        assert_eq!(scan.skipped.len(), 1);
        assert_eq!(scan.skipped[0].line_no, 3);
    }

    #[tokio::test]
    async fn scan_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlLog::new(dir.path().join("nope.jsonl"));
        let scan = log.scan().await.unwrap();
        assert!(scan.records.is_empty());
        assert!(scan.skipped.is_empty());
    }

    #[tokio::test]
    async fn append_creates_directories_and_keeps_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlLog::new(dir.path().join("deep/er/indicators.jsonl"));

        log.append(&json!({"evidence": "line one\nline two"})).await.unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));
        assert!(text.contains("line one\\nline two"));
    }

    #[test]
    fn non_object_lines_are_skipped() {
        let scan = parse_lines("42\n\"x\"\n[]\n{\"who\":\"a\"}\n");
        assert_eq!(scan.records.len(), 1);
        let skipped: Vec<usize> = scan.skipped.iter().map(|s| s.line_no).collect();
        assert_eq!(skipped, vec![1, 2, 3]);
        assert!(scan.skipped.iter().all(|s| s.reason == "not a JSON object"));
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let scan = parse_lines(b"{\"who\":\"a\"}\n\xff\xfe garbage\n{\"who\":\"b\"}\r\n");
        assert_eq!(scan.records.len(), 2);
        assert_eq!(scan.records[1].who, vec!["b"]);
        assert_eq!(scan.skipped.len(), 1);
        assert_eq!(scan.skipped[0].line_no, 2);
    }

    #[tokio::test]
    async fn append_after_unterminated_line_starts_a_new_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlLog::new(dir.path().join("indicators.jsonl"));
        std::fs::write(log.path(), "{\"who\":\"a\"}").unwrap();

        log.append(&json!({"who": "b"})).await.unwrap();
        log.append(&json!({"who": "c"})).await.unwrap();

        let scan = log.scan().await.unwrap();
        assert!(scan.skipped.is_empty());
        let who: Vec<&str> = scan.records.iter().map(|r| r.who[0].as_str()).collect();
        assert_eq!(who, ["a", "b", "c"]);
        assert_eq!(
            std::fs::read_to_string(log.path()).unwrap().lines().count(),
            3
        );
    }
}
