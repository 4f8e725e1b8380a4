//! Append-only Markdown note updater
//!
//! Turns hierarchy rows (root-to-leaf label paths) into one Markdown note
//! per title, in the layout used by Obsidian-style vaults:
//!
//! ```text
//! # Title
//!
//! ## Parents
//! - [[Parent]]
//!
//! ## Children
//! - [[Child]]
//!
//! ## Description and source
//! - **Description:** ...
//!   **Source:** ...
//! ```
//!
//! Existing notes are never rewritten: missing sections are appended at the
//! end, missing links and description blocks go after the last non-blank
//! line of their section, and every other line is left exactly as it was.

use crate::error::{StoreError, StoreResult};
use crate::snapshot::write_atomic;
use once_cell::sync::Lazy;
use regex::Regex;
use sat_record::HierarchyRow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

static WIKILINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]+)?\]\]").expect("static regex"));
static FORBIDDEN_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

const PARENTS: &str = "Parents";
const CHILDREN: &str = "Children";
const DESCRIPTION: &str = "Description and source";
const DESCRIPTION_PREFIX: &str = "- **Description:**";
const SOURCE_PREFIX: &str = "**Source:**";

/// Description/source pair attached to a leaf title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafEntry {
    /// What was observed
    pub description: String,
    /// Where it was observed
    pub source: String,
}

impl LeafEntry {
    /// Whitespace-collapsed, lowercased dedup key
    #[must_use]
    pub fn key(&self) -> String {
        leaf_key(&self.description, &self.source)
    }
}

fn leaf_key(description: &str, source: &str) -> String {
    let joined = format!("{}\n{}", description.trim(), source.trim());
    WHITESPACE.replace_all(&joined, " ").trim().to_lowercase()
}

/// Parent/child graph over titles
#[derive(Debug, Clone, Default)]
pub struct TitleGraph {
    children: BTreeMap<String, BTreeSet<String>>,
    parents: BTreeMap<String, BTreeSet<String>>,
    leaves: BTreeMap<String, Vec<LeafEntry>>,
    edge_count: usize,
    leaf_entry_count: usize,
}

impl TitleGraph {
    /// Build from rows
    ///
    /// Blank parts are dropped; rows with no part left are skipped.
    /// Consecutive parts become parent -> child edges. The last part
    /// receives the row's description/source when either is non-empty.
    #[must_use]
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a HierarchyRow>,
    {
        let mut graph = Self::default();
        for row in rows {
            let parts: Vec<&str> = row
                .parts
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .collect();
            let (Some(first), Some(leaf)) = (parts.first(), parts.last()) else {
                continue;
            };

            for pair in parts.windows(2) {
                let (parent, child) = (pair[0].to_string(), pair[1].to_string());
                if graph.children.entry(parent.clone()).or_default().insert(child.clone()) {
                    graph.edge_count += 1;
                }
                graph.parents.entry(child).or_default().insert(parent);
            }

            let description = row.description.trim();
            let source = row.source.trim();
            if !description.is_empty() || !source.is_empty() {
                graph.leaves.entry((*leaf).to_string()).or_default().push(LeafEntry {
                    description: description.to_string(),
                    source: source.to_string(),
                });
                graph.leaf_entry_count += 1;
            }

            graph.children.entry((*leaf).to_string()).or_default();
            graph.parents.entry((*first).to_string()).or_default();
        }
        graph
    }

    /// Every title, sorted case-insensitively
    #[must_use]
    pub fn titles(&self) -> Vec<&str> {
        let mut all: BTreeSet<&str> = self.children.keys().map(String::as_str).collect();
        all.extend(self.parents.keys().map(String::as_str));
        all.extend(self.leaves.keys().map(String::as_str));
        let mut titles: Vec<&str> = all.into_iter().collect();
        titles.sort_by_key(|t| t.to_lowercase());
        titles
    }

    /// Titles without parents
    #[must_use]
    pub fn roots(&self) -> Vec<&str> {
        self.titles()
            .into_iter()
            .filter(|t| self.parents.get(*t).map_or(true, BTreeSet::is_empty))
            .collect()
    }

    /// Parents of a title
    #[must_use]
    pub fn parents_of(&self, title: &str) -> Vec<String> {
        self.parents.get(title).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    /// Children of a title
    #[must_use]
    pub fn children_of(&self, title: &str) -> Vec<String> {
        self.children.get(title).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    /// Leaf entries of a title
    #[must_use]
    pub fn leaf_entries(&self, title: &str) -> &[LeafEntry] {
        self.leaves.get(title).map_or(&[], Vec::as_slice)
    }

    /// Summary counts for a dry run
    #[must_use]
    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            notes: self.titles().len(),
            edges: self.edge_count,
            leaf_entries: self.leaf_entry_count,
            roots: self.roots().into_iter().map(str::to_string).collect(),
        }
    }
}

/// Dry-run summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSummary {
    /// Notes that would be written
    pub notes: usize,
    /// Distinct parent -> child links
    pub edges: usize,
    /// Description/source rows
    pub leaf_entries: usize,
    /// Titles without parents
    pub roots: Vec<String>,
}

impl Display for GraphSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes (notes): {}", self.notes)?;
        writeln!(f, "Edges (parent->child links): {}", self.edges)?;
        writeln!(f, "Leaf entries (description/source rows): {}", self.leaf_entries)?;
        if !self.roots.is_empty() {
            let shown: Vec<&str> = self.roots.iter().take(10).map(String::as_str).collect();
            let more = if self.roots.len() > 10 { " ..." } else { "" };
            writeln!(f, "Root nodes (no parents): {}{more}", shown.join(", "))?;
        }
        Ok(())
    }
}

/// Filesystem-safe file stem for a title
///
/// Keeps Unicode; replaces `\ / : * ? " < > |` with ` - `, collapses
/// whitespace, strips trailing spaces and dots.
#[must_use]
pub fn sanitize_filename(title: &str) -> String {
    let replaced = FORBIDDEN_FILENAME_CHARS.replace_all(title.trim(), " - ");
    let collapsed = WHITESPACE.replace_all(&replaced, " ");
    let stem = collapsed.trim().trim_end_matches([' ', '.']);
    if stem.is_empty() {
        "Untitled".to_string()
    } else {
        stem.to_string()
    }
}

/// Lines of a brand new note
#[must_use]
pub fn new_note_lines(title: &str) -> Vec<String> {
    [
        format!("# {title}"),
        String::new(),
        format!("## {PARENTS}"),
        String::new(),
        format!("## {CHILDREN}"),
        String::new(),
        format!("## {DESCRIPTION}"),
        String::new(),
    ]
    .into()
}

/// `(start, end)` of a `## header` section; `end` is the next `## ` line or EOF
fn section_range(lines: &[String], header: &str) -> Option<(usize, usize)> {
    let heading = format!("## {header}");
    let start = lines.iter().position(|l| l.trim() == heading)?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.starts_with("## "))
        .map_or(lines.len(), |offset| start + 1 + offset);
    Some((start, end))
}

fn ensure_section(lines: &mut Vec<String>, header: &str) -> (usize, usize) {
    if let Some(range) = section_range(lines, header) {
        return range;
    }
    if lines.last().is_some_and(|l| !l.trim().is_empty()) {
        lines.push(String::new());
    }
    lines.push(format!("## {header}"));
    lines.push(String::new());
    (lines.len() - 2, lines.len())
}

/// Insert position inside a section: after its last non-blank line
fn insertion_point(lines: &[String], start: usize, end: usize) -> usize {
    let mut at = end;
    while at > start + 1 && lines[at - 1].trim().is_empty() {
        at -= 1;
    }
    at
}

fn existing_links(lines: &[String]) -> HashSet<String> {
    lines
        .iter()
        .flat_map(|l| WIKILINK.captures_iter(l))
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .collect()
}

fn existing_leaf_keys(lines: &[String]) -> HashSet<String> {
    let mut keys = HashSet::new();
    let mut description: Option<String> = None;
    for line in lines {
        let t = line.trim();
        if let Some(rest) = t.strip_prefix(DESCRIPTION_PREFIX) {
            description = Some(rest.trim().to_string());
        } else if let Some(rest) = t.strip_prefix(SOURCE_PREFIX) {
            if let Some(desc) = description.take() {
                keys.insert(leaf_key(&desc, rest));
            }
        }
    }
    keys
}

/// Append `- [[link]]` lines for links not yet in the section
///
/// Returns the number of lines added.
pub fn append_missing_links(lines: &mut Vec<String>, header: &str, links: &[String]) -> usize {
    let (start, end) = ensure_section(lines, header);
    let existing = existing_links(&lines[start..end]);

    let mut to_add: Vec<&String> = links.iter().filter(|l| !existing.contains(l.as_str())).collect();
    to_add.sort_by_key(|l| l.to_lowercase());
    to_add.dedup();

    let count = to_add.len();
    let at = insertion_point(lines, start, end);
    let new_lines: Vec<String> = to_add.into_iter().map(|l| format!("- [[{l}]]")).collect();
    lines.splice(at..at, new_lines);
    count
}

/// Append description/source blocks whose key is not yet present
///
/// Returns the number of blocks added.
pub fn append_missing_leaf_blocks(lines: &mut Vec<String>, entries: &[LeafEntry]) -> usize {
    let (start, end) = ensure_section(lines, DESCRIPTION);
    let mut existing = existing_leaf_keys(&lines[start..end]);

    let mut block = Vec::new();
    let mut count = 0;
    for entry in entries {
        let key = entry.key();
        if key.is_empty() || !existing.insert(key) {
            continue;
        }
        block.push(format!("{DESCRIPTION_PREFIX} {}", entry.description).trim_end().to_string());
        block.push(format!("  {SOURCE_PREFIX} {}", entry.source).trim_end().to_string());
        count += 1;
    }
    let at = insertion_point(lines, start, end);
    lines.splice(at..at, block);
    count
}

/// What happened to one note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteUpdate {
    /// Note file
    pub path: PathBuf,
    /// Whether the note was created
    pub created: bool,
    /// Lines appended (links plus description/source lines)
    pub appended_lines: usize,
}

/// Update one note file, append-only
///
/// # Errors
/// Read or write failures on the note.
pub async fn update_note(
    path: &Path,
    title: &str,
    parents: &[String],
    children: &[String],
    leaf_entries: &[LeafEntry],
) -> StoreResult<NoteUpdate> {
    let original = match tokio::fs::read_to_string(path).await {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(StoreError::read(path, e)),
    };
    let created = original.is_none();
    let mut lines: Vec<String> = match original.as_deref() {
        Some(text) if !text.trim().is_empty() => text.lines().map(str::to_string).collect(),
        _ => new_note_lines(title),
    };
    let before = lines.len();

    if !parents.is_empty() {
        append_missing_links(&mut lines, PARENTS, parents);
    }
    if !children.is_empty() {
        append_missing_links(&mut lines, CHILDREN, children);
    }
    if !leaf_entries.is_empty() {
        append_missing_leaf_blocks(&mut lines, leaf_entries);
    }

    let mut out = lines.join("\n").trim_end().to_string();
    out.push('\n');
    if original.as_deref() != Some(out.as_str()) {
        write_atomic(path, out.as_bytes()).await?;
    }

    Ok(NoteUpdate {
        path: path.to_path_buf(),
        created,
        appended_lines: lines.len().saturating_sub(before),
    })
}

/// Write or update one note per title of the graph under `dir`
///
/// # Errors
/// First failing note aborts the run; notes already written stay written.
pub async fn write_notes(dir: &Path, graph: &TitleGraph) -> StoreResult<Vec<NoteUpdate>> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StoreError::create_dir(dir, e))?;

    let mut updates = Vec::new();
    for title in graph.titles() {
        let path = dir.join(format!("{}.md", sanitize_filename(title)));
        let update = update_note(
            &path,
            title,
            &graph.parents_of(title),
            &graph.children_of(title),
            graph.leaf_entries(title),
        )
        .await?;
        updates.push(update);
    }

    tracing::info!(
        dir = %dir.display(),
        notes = updates.len(),
        created = updates.iter().filter(|u| u.created).count(),
        "notes updated"
    );
    Ok(updates)
}
