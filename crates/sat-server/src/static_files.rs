//! File serving under a fixed root
//!
//! Request paths are percent-decoded before inspection, so `%2e%2e` is
//! caught the same way as `..`.

use crate::error::{ApiError, ApiResult};
use percent_encoding::percent_decode_str;
use sat_store::StoreError;
use std::path::{Path, PathBuf};
use warp::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use warp::reply::{Reply, Response};

const INDEX: &str = "index.html";

/// Content type for a file name, by extension
#[must_use]
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" => "application/json",
        "jsonl" => "application/x-ndjson",
        "txt" | "md" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Resolve a raw request path under `root`
///
/// Returns `None` for the root itself.
///
/// # Errors
/// `ApiError::Forbidden` for parent segments, drive prefixes, NUL bytes or
/// paths that do not decode to UTF-8.
pub fn resolve(root: &Path, raw: &str) -> ApiResult<Option<PathBuf>> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| ApiError::Forbidden(raw.to_string()))?;

    let mut relative = PathBuf::new();
    for segment in decoded.split(&['/', '\\'][..]) {
        match segment {
            "" | "." => {}
            ".." => return Err(ApiError::Forbidden(raw.to_string())),
            s if s.contains(':') || s.contains('\0') => {
                return Err(ApiError::Forbidden(raw.to_string()));
            }
            s => relative.push(s),
        }
    }

    if relative.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(root.join(relative)))
    }
}

/// Serve a static asset; the root and directories map to their `index.html`
///
/// # Errors
/// Forbidden on traversal, not found when absent, storage otherwise.
pub async fn serve_static(root: &Path, raw: &str) -> ApiResult<Response> {
    let mut path = resolve(root, raw)?.unwrap_or_else(|| root.to_path_buf());
    if tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
        path.push(INDEX);
    }
    read_file(&path, raw).await
}

/// Serve a file from the data directory; directories are not listed
///
/// # Errors
/// Forbidden on traversal, not found when absent or a directory.
pub async fn serve_data(data_dir: &Path, raw: &str) -> ApiResult<Response> {
    let Some(path) = resolve(data_dir, raw)? else {
        return Err(ApiError::NotFound(format!("/data/{raw}")));
    };
    if tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Err(ApiError::NotFound(format!("/data/{raw}")));
    }
    let response = read_file(&path, raw).await?;
    Ok(warp::reply::with_header(response, CACHE_CONTROL, "no-store").into_response())
}

async fn read_file(path: &Path, raw: &str) -> ApiResult<Response> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            tracing::trace!(path = %path.display(), bytes = bytes.len(), "serving file");
            Ok(warp::reply::with_header(bytes, CONTENT_TYPE, content_type(path)).into_response())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound(format!("/{raw}")))
        }
        Err(e) => Err(StoreError::read(path, e).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_resolve_under_root() {
        let root = Path::new("/srv/tool");
        assert_eq!(resolve(root, "").unwrap(), None);
        assert_eq!(
            resolve(root, "css/app.css").unwrap(),
            Some(PathBuf::from("/srv/tool/css/app.css"))
        );
        assert_eq!(
            resolve(root, "./a//b%20c.html").unwrap(),
            Some(PathBuf::from("/srv/tool/a/b c.html"))
        );
    }

    #[test]
    fn traversal_is_forbidden() {
        let root = Path::new("/srv/tool");
        for raw in ["../etc/passwd", "a/../../b", "%2e%2e/secret", "%2E%2E%2Fsecret", "..%5Cwin"] {
            assert!(
                matches!(resolve(root, raw), Err(ApiError::Forbidden(_))),
                "{raw} should be forbidden"
            );
        }
    }

    #[test]
    fn drive_prefixes_and_nul_are_forbidden() {
        let root = Path::new("/srv/tool");
        assert!(resolve(root, "C:/Windows").is_err());
        assert!(resolve(root, "a%00b").is_err());
        assert!(resolve(root, "%ff").is_err());
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type(Path::new("index.HTML")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("board.svg")), "image/svg+xml");
        assert_eq!(content_type(Path::new("evidence.json")), "application/json");
        assert_eq!(content_type(Path::new("Makefile")), "application/octet-stream");
    }
}
