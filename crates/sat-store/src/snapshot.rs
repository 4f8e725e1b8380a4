//! Whole-file snapshots
//!
//! Trees are saved wholesale: last writer wins. Bytes go to a hidden
//! sibling file first and are renamed over the destination, so a reader
//! never sees a half-written tree.

use crate::error::{ensure_parent_dir, StoreError, StoreResult};
use sat_record::BoardTree;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace the file at `path` with `bytes`
///
/// # Errors
/// Directory creation, write or rename failures.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    ensure_parent_dir(path).await?;

    let tmp = temp_sibling(path);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::write(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::write(path, e));
    }
    Ok(())
}

/// Save a board tree, replacing whatever was there
///
/// # Errors
/// Serialization or write failures.
pub async fn save_tree(path: &Path, tree: &BoardTree) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(tree)?;
    write_atomic(path, &bytes).await?;
    tracing::info!(path = %path.display(), nodes = tree.node_count(), "saved tree");
    Ok(())
}

/// Load and validate a board tree
///
/// # Errors
/// - `StoreError::Read` if the file cannot be read (including not-found)
/// - `StoreError::InvalidTree` if it is not valid JSON or not a valid tree
pub async fn load_tree(path: &Path) -> StoreResult<BoardTree> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StoreError::read(path, e))?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| StoreError::InvalidTree {
            path: path.to_path_buf(),
            source: sat_record::TreeError::Shape(e.to_string()),
        })?;
    BoardTree::from_value(value).map_err(|source| StoreError::InvalidTree {
        path: path.to_path_buf(),
        source,
    })
}
