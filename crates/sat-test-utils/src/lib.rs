//! Testing utilities for the SAT tools workspace
//!
//! Shared fixtures: raw client payloads, normalized records, board trees
//! and scratch data directories.

#![allow(missing_docs)]

use sat_record::{normalize, BoardNode, BoardTree, IndicatorRecord};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Raw payload as the indicator form posts it
pub fn raw_indicator(n: usize) -> Value {
    json!({
        "id": format!("rec-{n}"),
        "createdAt": format!("2024-05-{:02}T08:30:00.000Z", (n % 28) + 1),
        "what": [format!("event {n}"), "  ", "shared"],
        "who": format!("actor {n}"),
        "when": null,
        "where": ["harbour"],
        "evidence": format!("  report #{n}  "),
        "sessionId": "session-a",
    })
}

/// Normalized form of [`raw_indicator`]
pub fn indicator(n: usize) -> IndicatorRecord {
    normalize(&raw_indicator(n))
}

/// Small evidence tree: root with two leaves and one nested branch
pub fn evidence_tree() -> BoardTree {
    BoardTree::Root(
        BoardNode::new("root", "Hypothesis: insider leak")
            .with_child(BoardNode::new("e1", "USB activity").with_evidence("Copy at 02:14", "DLP log"))
            .with_child(
                BoardNode::new("e2", "Access pattern")
                    .with_child(BoardNode::new("e3", "Off-hours login").with_evidence("VPN 03:00", "SIEM")),
            ),
    )
}

/// Scratch data directory removed on drop
pub struct DataDir {
    dir: TempDir,
}

impl DataDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.join(name)).expect("read fixture")
    }
}

impl Default for DataDir {
    fn default() -> Self {
        Self::new()
    }
}
