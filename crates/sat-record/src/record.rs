//! Indicator records
//!
//! One [`IndicatorRecord`] is produced per user "generate" action. Records
//! are built through [`crate::normalize`]; the fields are public so tests and
//! callers can inspect them, but the shape only stays canonical when it comes
//! out of the normalizer.

use crate::category::{Category, CategoryItems};
use serde::{Deserialize, Serialize};

/// A timestamped set of six categorized keyword lists
///
/// Serialized with camelCase keys. All six category arrays are always
/// present; the optional string fields are omitted entirely when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorRecord {
    /// Client-side identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// ISO-8601 UTC timestamp
    pub created_at: String,
    /// What happened
    #[serde(default)]
    pub what: Vec<String>,
    /// Who was involved
    #[serde(default)]
    pub who: Vec<String>,
    /// When it happened
    #[serde(default)]
    pub when: Vec<String>,
    /// Where it happened
    #[serde(default, rename = "where")]
    pub where_: Vec<String>,
    /// Why it happened
    #[serde(default)]
    pub why: Vec<String>,
    /// How it happened
    #[serde(default)]
    pub how: Vec<String>,
    /// Free-text evidence the keywords were drawn from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    /// Browser session that produced the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Version of the tool that produced the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

impl IndicatorRecord {
    /// Empty record stamped with the given time
    #[must_use]
    pub fn empty(created_at: impl Into<String>) -> Self {
        Self {
            id: None,
            created_at: created_at.into(),
            what: Vec::new(),
            who: Vec::new(),
            when: Vec::new(),
            where_: Vec::new(),
            why: Vec::new(),
            how: Vec::new(),
            evidence: None,
            session_id: None,
            app_version: None,
        }
    }

    /// Items of one category
    #[must_use]
    pub fn items(&self, category: Category) -> &[String] {
        match category {
            Category::What => &self.what,
            Category::Who => &self.who,
            Category::When => &self.when,
            Category::Where => &self.where_,
            Category::Why => &self.why,
            Category::How => &self.how,
        }
    }

    /// Mutable items of one category
    pub fn items_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::What => &mut self.what,
            Category::Who => &mut self.who,
            Category::When => &mut self.when,
            Category::Where => &mut self.where_,
            Category::Why => &mut self.why,
            Category::How => &mut self.how,
        }
    }

    /// Total keyword count across the six categories
    #[must_use]
    pub fn keyword_count(&self) -> usize {
        Category::ALL.iter().map(|c| self.items(*c).len()).sum()
    }

    /// Copy the keywords into a per-category collection
    #[must_use]
    pub fn to_category_items(&self) -> CategoryItems {
        let mut items = CategoryItems::new();
        for category in Category::ALL {
            items.extend(category, self.items(category).iter().cloned());
        }
        items
    }
}

/// Union of the keywords of many records, first occurrence wins
///
/// Duplicates within a category are collapsed; record order and in-record
/// order are preserved.
#[must_use]
pub fn union_items<'a, I>(records: I) -> CategoryItems
where
    I: IntoIterator<Item = &'a IndicatorRecord>,
{
    let mut items = CategoryItems::new();
    for record in records {
        for category in Category::ALL {
            for item in record.items(category) {
                items.push_unique(category, item);
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serializes_minimal_shape() {
        let mut record = IndicatorRecord::empty("2024-03-01T10:00:00.000Z");
        record.where_.push("Kyiv".to_string());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "createdAt": "2024-03-01T10:00:00.000Z",
                "what": [],
                "who": [],
                "when": [],
                "where": ["Kyiv"],
                "why": [],
                "how": []
            })
        );
    }

    #[test]
    fn optional_fields_use_camel_case() {
        let mut record = IndicatorRecord::empty("2024-03-01T10:00:00Z");
        record.session_id = Some("s-1".to_string());
        record.app_version = Some("1.2".to_string());

        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"sessionId\":\"s-1\""));
        assert!(line.contains("\"appVersion\":\"1.2\""));
        assert!(!line.contains("evidence"));
    }

    #[test]
    fn union_collapses_duplicates_in_order() {
        let mut a = IndicatorRecord::empty("2024-03-01T10:00:00Z");
        a.who = vec!["alice".into(), "bob".into()];
        let mut b = IndicatorRecord::empty("2024-03-02T10:00:00Z");
        b.who = vec!["bob".into(), "carol".into()];
        b.how = vec!["usb".into()];

        let items = union_items([&a, &b]);
        assert_eq!(items.get(Category::Who), ["alice", "bob", "carol"]);
        assert_eq!(items.get(Category::How), ["usb"]);
        assert_eq!(items.total(), 4);
    }
}
