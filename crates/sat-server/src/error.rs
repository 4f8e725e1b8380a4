//! HTTP-facing errors
//!
//! Every failure a handler can hit maps to one status code and a
//! `{ "ok": false, "error": ... }` body.

use sat_record::TreeError;
use sat_store::StoreError;
use serde::Serialize;
use std::path::PathBuf;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};

/// Result alias for request handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Request failures
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Body is not valid JSON
    #[error("invalid JSON: {0}")]
    BadJson(#[from] serde_json::Error),

    /// Body is not UTF-8 text
    #[error("body is not valid UTF-8")]
    BadEncoding,

    /// Body is JSON but not a valid board tree
    #[error("invalid tree: {0}")]
    InvalidTree(#[from] TreeError),

    /// Path escapes its root
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Nothing at that path
    #[error("not found: {0}")]
    NotFound(String),

    /// Method not served on that path
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Body over the configured cap
    #[error("payload too large")]
    PayloadTooLarge,

    /// Body without a content length
    #[error("content length required")]
    LengthRequired,

    /// Storage failed and nothing kept the data
    #[error("{0}")]
    Storage(#[from] StoreError),

    /// Primary storage failed; the record went to an export file instead
    #[error("{error}")]
    Exported {
        /// Primary failure
        error: String,
        /// Export file holding the record
        exported_to: PathBuf,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    ok: bool,
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exported_to: Option<String>,
}

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadJson(_) | Self::BadEncoding | Self::InvalidTree(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::LengthRequired => StatusCode::LENGTH_REQUIRED,
            Self::Storage(_) | Self::Exported { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON error response
    #[must_use]
    pub fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        let message = self.to_string();
        let exported_to = match &self {
            Self::Exported { exported_to, .. } => Some(exported_to.display().to_string()),
            _ => None,
        };
        let body = ErrorBody {
            ok: false,
            error: &message,
            exported_to,
        };
        reply::with_status(reply::json(&body), status).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(ApiError::from(bad_json).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(TreeError::DuplicateId("a".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Forbidden("..".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn storage_errors_map_to_500() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ApiError::from(StoreError::write("/data/indicators.jsonl", io));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("/data/indicators.jsonl"));
    }

    #[test]
    fn export_error_keeps_message() {
        let err = ApiError::Exported {
            error: "disk full".into(),
            exported_to: PathBuf::from("exports/x.json"),
        };
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
