//! Offline commands: `merge` and `notes`

use anyhow::{Context, Result};
use sat_record::HierarchyRow;
use sat_store::notes::{self, GraphSummary, NoteUpdate, TitleGraph};
use sat_store::{snapshot, JsonlLog, MergeReport, SkippedLine};
use std::path::Path;

/// Where `notes` reads its hierarchy from
#[derive(Debug, Clone, Copy)]
pub enum RowSource<'a> {
    /// One `{parts, description, source}` object per line
    Rows(&'a Path),
    /// Saved board tree, flattened to root-to-leaf rows
    Tree(&'a Path),
}

/// Result of the `notes` command
#[derive(Debug)]
pub enum NotesOutcome {
    /// Nothing written
    DryRun(GraphSummary),
    /// Notes written or updated
    Written(Vec<NoteUpdate>),
}

/// Merge an indicator log into a bulleted document
///
/// # Errors
/// Log read or document read/write failure.
pub async fn run_merge(log: &Path, doc: &Path) -> Result<(MergeReport, Vec<SkippedLine>)> {
    let log = JsonlLog::new(log);
    sat_store::refresh_document(&log, doc)
        .await
        .with_context(|| format!("merging {} into {}", log.path().display(), doc.display()))
}

/// Load hierarchy rows
///
/// # Errors
/// Unreadable input, a malformed row line or an invalid tree.
pub async fn load_rows(source: RowSource<'_>) -> Result<Vec<HierarchyRow>> {
    match source {
        RowSource::Tree(path) => {
            let tree = snapshot::load_tree(path).await?;
            Ok(tree.rows())
        }
        RowSource::Rows(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading rows from {}", path.display()))?;
            text.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| {
                    serde_json::from_str::<HierarchyRow>(line)
                        .with_context(|| format!("{}:{}: invalid row", path.display(), i + 1))
                })
                .collect()
        }
    }
}

/// Build the title graph and write (or just summarize) the notes
///
/// # Errors
/// Input or note write failure.
pub async fn run_notes(source: RowSource<'_>, out: &Path, dry_run: bool) -> Result<NotesOutcome> {
    let rows = load_rows(source).await?;
    let graph = TitleGraph::from_rows(&rows);

    if dry_run {
        return Ok(NotesOutcome::DryRun(graph.summary()));
    }
    let updates = notes::write_notes(out, &graph)
        .await
        .with_context(|| format!("writing notes to {}", out.display()))?;
    Ok(NotesOutcome::Written(updates))
}
