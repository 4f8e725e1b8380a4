//! SAT Records
//!
//! Data model shared by every SAT tool server.
//!
//! # Core Types
//!
//! - [`IndicatorRecord`]: one 5W1H keyword set, always in canonical shape
//! - [`Category`] / [`CategoryItems`]: the six categories and per-category item lists
//! - [`BoardTree`] / [`BoardNode`]: evidence, causal-map and hypothesis trees
//!
//! # Example
//!
//! ```rust
//! use sat_record::{normalize, Category};
//! use serde_json::json;
//!
//! let record = normalize(&json!({"who": "  insider ", "what": ["exfil", ""]}));
//! assert_eq!(record.items(Category::Who), ["insider"]);
//! assert_eq!(record.items(Category::What), ["exfil"]);
//! assert!(record.how.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod category;
pub mod normalize;
pub mod record;
pub mod tree;

pub use category::{Category, CategoryItems, UnknownCategory};
pub use normalize::{format_timestamp, is_iso_datetime, normalize, normalize_at};
pub use record::{union_items, IndicatorRecord};
pub use tree::{BoardNode, BoardTree, HierarchyRow, TreeError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
