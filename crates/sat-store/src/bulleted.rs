//! Category-bulleted text documents and merge-on-refresh
//!
//! Format:
//!
//! ```text
//! What?
//! - data exfiltration
//! - credential theft
//!
//! Who?
//! - insider
//! ```
//!
//! Known category sections are parsed into [`CategoryItems`]. Anything else
//! (text before the first header, sections under unknown `...?` headers) is
//! kept verbatim and written back untouched. Merging only ever appends.

use crate::error::{StoreError, StoreResult};
use crate::snapshot::write_atomic;
use sat_record::{Category, CategoryItems};
use std::path::Path;

/// Line written when a document has nothing to show
pub const PLACEHOLDER: &str = "(no indicators recorded yet)";

/// Parsed bulleted document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulletedDocument {
    items: CategoryItems,
    preamble: Vec<String>,
    preserved: Vec<Vec<String>>,
}

/// Items appended by a merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// New items per category, in the order they were appended
    pub added: CategoryItems,
}

impl MergeReport {
    /// Number of appended items
    #[inline]
    #[must_use]
    pub fn added_count(&self) -> usize {
        self.added.total()
    }
}

enum Cursor {
    Preamble,
    Category(Category),
    Preserved(usize),
}

fn bullet_text(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| (line == "-" || line == "*").then_some(""))
}

fn is_unknown_header(line: &str) -> bool {
    line.ends_with('?') && bullet_text(line).is_none()
}

fn trim_trailing_blanks(lines: &mut Vec<String>) {
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
}

impl BulletedDocument {
    /// Empty document
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Document holding the given items and nothing else
    #[must_use]
    pub fn from_items(items: CategoryItems) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Parse document text
    ///
    /// Never fails: unrecognised content is preserved rather than rejected.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut doc = Self::default();
        let mut cursor = Cursor::Preamble;

        for raw in text.lines() {
            let line = raw.trim();
            if line == PLACEHOLDER {
                continue;
            }

            if bullet_text(line).is_none() {
                if let Some(category) = Category::from_header(line) {
                    cursor = Cursor::Category(category);
                    continue;
                }
                if is_unknown_header(line) {
                    doc.preserved.push(vec![raw.trim_end().to_string()]);
                    cursor = Cursor::Preserved(doc.preserved.len() - 1);
                    continue;
                }
            }

            match cursor {
                Cursor::Category(category) => {
                    let item = bullet_text(line).unwrap_or(line).trim();
                    if !item.is_empty() {
                        doc.items.push(category, item);
                    }
                }
                Cursor::Preserved(idx) => doc.preserved[idx].push(raw.trim_end().to_string()),
                Cursor::Preamble => {
                    if !(line.is_empty() && doc.preamble.is_empty()) {
                        doc.preamble.push(raw.trim_end().to_string());
                    }
                }
            }
        }

        trim_trailing_blanks(&mut doc.preamble);
        for section in &mut doc.preserved {
            trim_trailing_blanks(section);
        }
        doc
    }

    /// Category items
    #[inline]
    #[must_use]
    pub fn items(&self) -> &CategoryItems {
        &self.items
    }

    /// Items of one category
    #[inline]
    #[must_use]
    pub fn category(&self, category: Category) -> &[String] {
        self.items.get(category)
    }

    /// Verbatim sections under unknown headers
    #[inline]
    #[must_use]
    pub fn preserved_sections(&self) -> &[Vec<String>] {
        &self.preserved
    }

    /// Union new items into the document
    ///
    /// Per category, an item is appended only if it is not already present
    /// (exact match), including items appended earlier in the same merge.
    /// Existing items are never removed or reordered. Line breaks inside an
    /// item are folded to single spaces first, since each item is one line.
    pub fn merge(&mut self, source: &CategoryItems) -> MergeReport {
        let mut report = MergeReport::default();
        for (category, items) in source.iter() {
            for item in items {
                let item = single_line(item);
                if !item.is_empty() && self.items.push_unique(category, &item) {
                    report.added.push(category, item);
                }
            }
        }
        report
    }

    /// Render the document
    ///
    /// Known categories come first in canonical order, then preserved
    /// sections in their original order, separated by blank lines. A
    /// document with nothing to show renders as the placeholder line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut blocks: Vec<String> = Vec::new();

        if !self.preamble.is_empty() {
            blocks.push(self.preamble.join("\n"));
        }
        for (category, items) in self.items.iter() {
            let mut block = String::from(category.header());
            for item in items {
                block.push_str("\n- ");
                block.push_str(item);
            }
            blocks.push(block);
        }
        for section in &self.preserved {
            blocks.push(section.join("\n"));
        }

        if blocks.is_empty() {
            return format!("{PLACEHOLDER}\n");
        }
        let mut out = blocks.join("\n\n");
        out.push('\n');
        out
    }
}

/// Fold an item onto one line: each line trimmed, blanks dropped, joined by a space
#[must_use]
pub fn single_line(item: &str) -> String {
    item.split(&['\n', '\r'][..])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Load a bulleted document, treating a missing file as empty
///
/// # Errors
/// `StoreError::Read` for failures other than not-found.
pub async fn load(path: &Path) -> StoreResult<Option<BulletedDocument>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(BulletedDocument::parse(&text))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::read(path, e)),
    }
}

/// Merge items into the document at `path` and write it back
///
/// The file is rewritten only when something was added or when it did not
/// exist yet (in which case it may receive just the placeholder line).
///
/// # Errors
/// Read or write failures on the document.
pub async fn merge_file(path: &Path, source: &CategoryItems) -> StoreResult<MergeReport> {
    let existing = load(path).await?;
    let created = existing.is_none();
    let mut doc = existing.unwrap_or_default();

    let report = doc.merge(source);
    if created || report.added_count() > 0 {
        write_atomic(path, doc.render().as_bytes()).await?;
    }

    tracing::info!(
        path = %path.display(),
        added = report.added_count(),
        created,
        "merged indicators into document"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
What?
- breach
- phishing

Notes?
- keep this
free text too

Who?
- insider
";

    #[test]
    fn parse_splits_known_and_unknown_sections() {
        let doc = BulletedDocument::parse(SAMPLE);
        assert_eq!(doc.category(Category::What), ["breach", "phishing"]);
        assert_eq!(doc.category(Category::Who), ["insider"]);
        assert_eq!(
            doc.preserved_sections(),
            [vec!["Notes?".to_string(), "- keep this".into(), "free text too".into()]]
        );
    }

    #[test]
    fn render_orders_categories_then_preserved() {
        let doc = BulletedDocument::parse(SAMPLE);
        assert_eq!(
            doc.render(),
            "What?\n- breach\n- phishing\n\nWho?\n- insider\n\nNotes?\n- keep this\nfree text too\n"
        );
    }

    #[test]
    fn merge_appends_only_missing_items() {
        let mut doc = BulletedDocument::parse(SAMPLE);
        let mut source = CategoryItems::new();
        source.extend(Category::What, ["phishing", "ransom", "ransom"]);
        source.extend(Category::How, ["usb stick"]);

        let report = doc.merge(&source);

        assert_eq!(doc.category(Category::What), ["breach", "phishing", "ransom"]);
        assert_eq!(doc.category(Category::How), ["usb stick"]);
        assert_eq!(report.added_count(), 2);
    }

    #[test]
    fn repeated_headers_concatenate() {
        let doc = BulletedDocument::parse("Why?\n- a\n\nWhy?\n- b\n");
        assert_eq!(doc.category(Category::Why), ["a", "b"]);
        assert_eq!(doc.render(), "Why?\n- a\n- b\n");
    }

    #[test]
    fn empty_document_renders_placeholder() {
        let mut doc = BulletedDocument::parse("");
        doc.merge(&CategoryItems::new());
        assert_eq!(doc.render(), format!("{PLACEHOLDER}\n"));
    }

    #[test]
    fn placeholder_is_dropped_on_reparse() {
        let doc = BulletedDocument::parse(&format!("{PLACEHOLDER}\n"));
        assert_eq!(doc, BulletedDocument::new());

        let mut doc = doc;
        let mut source = CategoryItems::new();
        source.push(Category::Where, "port");
        doc.merge(&source);
        assert_eq!(doc.render(), "Where?\n- port\n");
    }

    #[test]
    fn preamble_stays_on_top() {
        let doc = BulletedDocument::parse("Case 42 keywords\n\nHow?\n- ssh\n");
        assert_eq!(doc.render(), "Case 42 keywords\n\nHow?\n- ssh\n");
    }

    #[test]
    fn unbulleted_lines_under_category_are_items() {
        let doc = BulletedDocument::parse("When?\nnight shift\n* weekend\n");
        assert_eq!(doc.category(Category::When), ["night shift", "weekend"]);
    }

    #[test]
    fn multiline_items_merge_once() {
        let mut source = CategoryItems::new();
        source.push(Category::What, "line one\nWho?");
        source.push(Category::What, "  \r\n ");

        let mut doc = BulletedDocument::new();
        assert_eq!(doc.merge(&source).added_count(), 1);
        let text = doc.render();
        assert_eq!(text, "What?\n- line one Who?\n");

        let mut reparsed = BulletedDocument::parse(&text);
        assert_eq!(reparsed.merge(&source).added_count(), 0);
        assert_eq!(reparsed.render(), text);
    }
}
