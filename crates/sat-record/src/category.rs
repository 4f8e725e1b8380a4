//! The six 5W1H indicator categories
//!
//! Provides [`Category`] (closed, canonically ordered) and [`CategoryItems`],
//! an ordered per-category item collection used by both the JSONL log and
//! the bulleted text documents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Indicator category (5W1H)
///
/// Declaration order is the canonical order used when serializing
/// documents: What, Who, When, Where, Why, How.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// What happened
    What,
    /// Who was involved
    Who,
    /// When it happened
    When,
    /// Where it happened
    Where,
    /// Why it happened
    Why,
    /// How it happened
    How,
}

impl Category {
    /// All categories in canonical order
    pub const ALL: [Category; 6] = [
        Category::What,
        Category::Who,
        Category::When,
        Category::Where,
        Category::Why,
        Category::How,
    ];

    /// JSON field name (`what`, `who`, ...)
    #[inline]
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::What => "what",
            Self::Who => "who",
            Self::When => "when",
            Self::Where => "where",
            Self::Why => "why",
            Self::How => "how",
        }
    }

    /// Header line used in bulleted documents (`What?`, `Who?`, ...)
    #[inline]
    #[must_use]
    pub fn header(self) -> &'static str {
        match self {
            Self::What => "What?",
            Self::Who => "Who?",
            Self::When => "When?",
            Self::Where => "Where?",
            Self::Why => "Why?",
            Self::How => "How?",
        }
    }

    /// Recognise a header line
    ///
    /// Case-insensitive, surrounding whitespace and a trailing `?` are
    /// optional. Returns `None` for anything that is not one of the six
    /// category names.
    #[must_use]
    pub fn from_header(line: &str) -> Option<Self> {
        let name = line.trim();
        let name = name.strip_suffix('?').unwrap_or(name).trim_end();
        name.parse().ok()
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned when a string names no category
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Ordered items per category
///
/// Iteration follows canonical category order; items keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryItems(BTreeMap<Category, Vec<String>>);

impl CategoryItems {
    /// Create empty collection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items for a category (empty slice if none)
    #[must_use]
    pub fn get(&self, category: Category) -> &[String] {
        self.0.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Append an item, keeping duplicates
    pub fn push(&mut self, category: Category, item: impl Into<String>) {
        self.0.entry(category).or_default().push(item.into());
    }

    /// Append items, keeping duplicates
    pub fn extend<I, S>(&mut self, category: Category, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slot = self.0.entry(category).or_default();
        slot.extend(items.into_iter().map(Into::into));
    }

    /// Append an item only if it is not already present (exact match)
    ///
    /// Returns `true` when the item was added.
    pub fn push_unique(&mut self, category: Category, item: &str) -> bool {
        let slot = self.0.entry(category).or_default();
        if slot.iter().any(|existing| existing == item) {
            false
        } else {
            slot.push(item.to_string());
            true
        }
    }

    /// Total number of items across all categories
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// True when no category has any item
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Non-empty categories in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.0
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(c, items)| (*c, items.as_slice()))
    }
}
