//! SAT Store
//!
//! Every file format the SAT tool servers read or write.
//!
//! # Core Operations
//!
//! - **Append**: normalized records go to an append-only JSONL log ([`JsonlLog`])
//! - **Merge-on-refresh**: log items are unioned into a bulleted text document ([`bulleted`])
//! - **Snapshot**: board trees are replaced wholesale ([`snapshot`])
//! - **Notes**: hierarchy rows become append-only Markdown notes ([`notes`])
//!
//! # Architecture
//!
//! ```text
//! request body → normalize → PersistStrategy ──→ JsonlLog (append one line)
//!                                   └─ on failure → ExportDir (one file per record)
//!
//! JsonlLog::scan → union_items → bulleted::merge_file → indicators.txt
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bulleted;
pub mod error;
pub mod jsonl;
pub mod notes;
pub mod persist;
pub mod snapshot;
pub mod submission;

pub use bulleted::{BulletedDocument, MergeReport, PLACEHOLDER};
pub use error::{StoreError, StoreResult};
pub use jsonl::{JsonlLog, LogScan, SkippedLine};
pub use persist::{ExportDir, PersistReceipt, PersistStrategy, WithFallback};
pub use submission::{Submission, SubmissionState};

use sat_record::union_items;
use std::path::Path;

/// Merge everything in `log` into the bulleted document at `doc`
///
/// Returns the merge report and the log lines that had to be skipped.
///
/// # Errors
/// Read failures on the log, read/write failures on the document.
pub async fn refresh_document(
    log: &JsonlLog,
    doc: &Path,
) -> StoreResult<(MergeReport, Vec<SkippedLine>)> {
    let scan = log.scan().await?;
    let items = union_items(&scan.records);
    let report = bulleted::merge_file(doc, &items).await?;
    Ok((report, scan.skipped))
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
