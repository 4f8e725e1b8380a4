//! Persistence strategies
//!
//! The append path is written against [`PersistStrategy`] so a secondary
//! strategy can be injected for when the primary one fails. The browser
//! tools download the record on a failed POST; [`ExportDir`] is the
//! server-side counterpart.

use crate::error::{StoreError, StoreResult};
use crate::jsonl::JsonlLog;
use crate::snapshot::write_atomic;
use async_trait::async_trait;
use sat_record::IndicatorRecord;
use std::path::PathBuf;

/// Where a record ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistReceipt {
    /// Appended to a log
    Appended {
        /// Log path
        path: PathBuf,
        /// Bytes written, newline included
        bytes: u64,
    },
    /// Written as a standalone export file
    Exported {
        /// Export file path
        path: PathBuf,
    },
    /// Primary failed, fallback succeeded
    FellBack {
        /// Why the primary failed
        primary_error: String,
        /// What the fallback did
        fallback: Box<PersistReceipt>,
    },
}

impl PersistReceipt {
    /// Whether the primary strategy stored the record
    #[inline]
    #[must_use]
    pub fn is_primary(&self) -> bool {
        !matches!(self, Self::FellBack { .. })
    }

    /// Path the record was finally written to
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Appended { path, .. } | Self::Exported { path } => path,
            Self::FellBack { fallback, .. } => fallback.path(),
        }
    }
}

/// Persist one normalized record
#[async_trait]
pub trait PersistStrategy: Send + Sync {
    /// Store the record
    ///
    /// # Errors
    /// Strategy-specific storage failure.
    async fn persist(&self, record: &IndicatorRecord) -> StoreResult<PersistReceipt>;

    /// Strategy name for logs
    fn name(&self) -> &'static str;
}

#[async_trait]
impl PersistStrategy for JsonlLog {
    async fn persist(&self, record: &IndicatorRecord) -> StoreResult<PersistReceipt> {
        let bytes = self.append(record).await?;
        Ok(PersistReceipt::Appended {
            path: self.path().to_path_buf(),
            bytes,
        })
    }

    fn name(&self) -> &'static str {
        "jsonl-log"
    }
}

/// Writes each record to its own pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct ExportDir {
    dir: PathBuf,
}

impl ExportDir {
    /// Create strategy writing into `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Export file name for a record
    ///
    /// `indicators-<createdAt>.json` with characters unsafe in file names
    /// replaced, plus the id when there is one. Collisions get a numeric
    /// suffix when the file is written, see [`ExportDir::reserve`].
    #[must_use]
    pub fn file_name(record: &IndicatorRecord) -> String {
        let stamp: String = record
            .created_at
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect();
        match &record.id {
            Some(id) => {
                let id: String = id
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                    .collect();
                format!("indicators-{stamp}-{id}.json")
            }
            None => format!("indicators-{stamp}.json"),
        }
    }

    /// Claim a path for `name` that no earlier export uses
    ///
    /// Tries `name`, then `<stem>-1.json`, `<stem>-2.json`, ... and creates
    /// the winner empty so a concurrent export cannot take it too.
    ///
    /// # Errors
    /// Directory creation or file creation failure other than a name clash.
    pub async fn reserve(&self, name: &str) -> StoreResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::create_dir(&self.dir, e))?;

        let stem = name.strip_suffix(".json").unwrap_or(name);
        let mut attempt: u32 = 0;
        loop {
            let path = if attempt == 0 {
                self.dir.join(name)
            } else {
                self.dir.join(format!("{stem}-{attempt}.json"))
            };
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok(path),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(StoreError::write(&path, e)),
            }
        }
    }
}

#[async_trait]
impl PersistStrategy for ExportDir {
    async fn persist(&self, record: &IndicatorRecord) -> StoreResult<PersistReceipt> {
        let bytes = serde_json::to_vec_pretty(record)?;
        let path = self.reserve(&Self::file_name(record)).await?;
        write_atomic(&path, &bytes).await?;
        Ok(PersistReceipt::Exported { path })
    }

    fn name(&self) -> &'static str {
        "export-dir"
    }
}

/// Primary strategy with a secondary used only when the primary fails
#[derive(Debug, Clone)]
pub struct WithFallback<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> WithFallback<P, S> {
    /// Compose two strategies
    #[must_use]
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl<P, S> PersistStrategy for WithFallback<P, S>
where
    P: PersistStrategy,
    S: PersistStrategy,
{
    async fn persist(&self, record: &IndicatorRecord) -> StoreResult<PersistReceipt> {
        let primary_error = match self.primary.persist(record).await {
            Ok(receipt) => return Ok(receipt),
            Err(e) => e,
        };

        tracing::warn!(
            primary = self.primary.name(),
            secondary = self.secondary.name(),
            error = %primary_error,
            "primary persist failed, using fallback"
        );

        match self.secondary.persist(record).await {
            Ok(fallback) => Ok(PersistReceipt::FellBack {
                primary_error: primary_error.to_string(),
                fallback: Box::new(fallback),
            }),
            Err(fallback_error) => Err(StoreError::FallbackFailed {
                primary: Box::new(primary_error),
                fallback: Box::new(fallback_error),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "with-fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_file_name_is_filesystem_safe() {
        let mut record = IndicatorRecord::empty("2024-03-01T10:00:00.000Z");
        assert_eq!(
            ExportDir::file_name(&record),
            "indicators-2024-03-01T10-00-00-000Z.json"
        );

        record.id = Some("ab/../c d".to_string());
        assert_eq!(
            ExportDir::file_name(&record),
            "indicators-2024-03-01T10-00-00-000Z-abcd.json"
        );
    }

    #[tokio::test]
    async fn same_timestamp_exports_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let export = ExportDir::new(dir.path().join("exports"));
        let mut first = IndicatorRecord::empty("2024-01-01T00:00:00Z");
        first.who = vec!["first".to_string()];
        let mut second = IndicatorRecord::empty("2024-01-01T00:00:00Z");
        second.who = vec!["second".to_string()];

        let a = export.persist(&first).await.unwrap();
        let b = export.persist(&second).await.unwrap();

        assert_eq!(
            a.path().file_name().unwrap(),
            "indicators-2024-01-01T00-00-00Z.json"
        );
        assert_eq!(
            b.path().file_name().unwrap(),
            "indicators-2024-01-01T00-00-00Z-1.json"
        );
        assert_eq!(std::fs::read_dir(dir.path().join("exports")).unwrap().count(), 2);
        let saved: IndicatorRecord =
            serde_json::from_slice(&std::fs::read(a.path()).unwrap()).unwrap();
        assert_eq!(saved.who, ["first"]);
    }

    #[test]
    fn receipt_path_follows_fallback() {
        let receipt = PersistReceipt::FellBack {
            primary_error: "disk full".to_string(),
            fallback: Box::new(PersistReceipt::Exported {
                path: PathBuf::from("/tmp/x.json"),
            }),
        };
        assert!(!receipt.is_primary());
        assert_eq!(receipt.path(), std::path::Path::new("/tmp/x.json"));
    }
}
