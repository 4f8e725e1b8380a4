//! HTTP routes
//!
//! ```text
//! POST /api/save-indicators     append (jsonl) or merge (bulleted)
//! POST /api/refresh-indicators  merge the log into the bulleted document
//! POST /api/save-evidence       replace the board tree
//! GET  /data/<file>             data directory
//! GET  /<path>                  static assets
//! ```

use crate::config::IndicatorsFormat;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::static_files;
use sat_record::{normalize, BoardTree};
use sat_store::{bulleted, snapshot, BulletedDocument, PersistReceipt, Submission};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::path::Tail;
use warp::reply::{self, Reply, Response};
use warp::{Filter, Rejection};

/// Every route, with rejections turned into JSON error responses
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
    let limit = state.config().max_body_bytes;

    let save_indicators = warp::post()
        .and(warp::path!("api" / "save-indicators"))
        .and(with_state(state.clone()))
        .and(warp::body::content_length_limit(limit))
        .and(warp::body::bytes())
        .then(|state: Arc<AppState>, body: Bytes| async move {
            respond(save_indicators(&state, &body).await)
        });

    let refresh_indicators = warp::post()
        .and(warp::path!("api" / "refresh-indicators"))
        .and(with_state(state.clone()))
        .then(|state: Arc<AppState>| async move { respond(refresh_indicators(&state).await) });

    let save_evidence = warp::post()
        .and(warp::path!("api" / "save-evidence"))
        .and(with_state(state.clone()))
        .and(warp::body::content_length_limit(limit))
        .and(warp::body::bytes())
        .then(|state: Arc<AppState>, body: Bytes| async move {
            respond(save_evidence(&state, &body).await)
        });

    let data = warp::get()
        .and(warp::path("data"))
        .and(warp::path::tail())
        .and(with_state(state.clone()))
        .then(|tail: Tail, state: Arc<AppState>| async move {
            respond(static_files::serve_data(&state.config().data_dir, tail.as_str()).await)
        });

    let assets = warp::get()
        .and(warp::path::tail())
        .and(with_state(state))
        .then(|tail: Tail, state: Arc<AppState>| async move {
            respond(serve_asset(&state, tail.as_str()).await)
        });

    save_indicators
        .or(refresh_indicators)
        .unify()
        .or(save_evidence)
        .unify()
        .or(data)
        .unify()
        .or(assets)
        .unify()
        .recover(handle_rejection)
        .unify()
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn respond(result: ApiResult<Response>) -> Response {
    result.unwrap_or_else(ApiError::into_response)
}

fn ok_json(body: &Value) -> Response {
    reply::with_status(reply::json(body), StatusCode::OK).into_response()
}

async fn save_indicators(state: &AppState, body: &[u8]) -> ApiResult<Response> {
    match state.config().indicators.format {
        IndicatorsFormat::Jsonl => {
            let value: Value = serde_json::from_slice(body)?;
            let record = normalize(&value);

            let mut submission = Submission::new();
            let receipt = submission.run(state.persist(), &record).await?;
            tracing::info!(
                path = %receipt.path().display(),
                keywords = record.keyword_count(),
                trace = ?submission.trace(),
                "indicator record saved"
            );

            match receipt {
                PersistReceipt::FellBack {
                    primary_error,
                    fallback,
                } => Err(ApiError::Exported {
                    error: primary_error,
                    exported_to: fallback.path().to_path_buf(),
                }),
                _ => Ok(ok_json(&json!({ "ok": true }))),
            }
        }
        IndicatorsFormat::Bulleted => {
            let text = std::str::from_utf8(body).map_err(|_| ApiError::BadEncoding)?;
            let incoming = BulletedDocument::parse(text);

            let _guard = state.document_lock().lock().await;
            let path = state.config().indicators_document();
            let report = bulleted::merge_file(&path, incoming.items()).await?;
            Ok(ok_json(&json!({ "ok": true, "added": report.added_count() })))
        }
    }
}

async fn refresh_indicators(state: &AppState) -> ApiResult<Response> {
    let _guard = state.document_lock().lock().await;
    let path = state.config().indicators_document();
    let (report, skipped) = sat_store::refresh_document(state.log(), &path).await?;

    if !skipped.is_empty() {
        tracing::warn!(
            log = %state.log().path().display(),
            skipped = skipped.len(),
            "unparseable log lines skipped during refresh"
        );
    }
    Ok(ok_json(&json!({
        "ok": true,
        "added": report.added_count(),
        "skippedLines": skipped,
    })))
}

async fn save_evidence(state: &AppState, body: &[u8]) -> ApiResult<Response> {
    let value: Value = serde_json::from_slice(body)?;
    let tree = BoardTree::from_value(value)?;

    let _guard = state.evidence_lock().lock().await;
    snapshot::save_tree(&state.config().evidence_file(), &tree).await?;
    Ok(ok_json(&json!({ "ok": true, "nodes": tree.node_count() })))
}

async fn serve_asset(state: &AppState, raw: &str) -> ApiResult<Response> {
    if raw == "api" || raw.starts_with("api/") {
        return Err(ApiError::MethodNotAllowed);
    }
    static_files::serve_static(&state.config().static_root, raw).await
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let api = if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        ApiError::PayloadTooLarge
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        ApiError::LengthRequired
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError::MethodNotAllowed
    } else if err.is_not_found() {
        ApiError::NotFound("no such route".to_string())
    } else {
        tracing::warn!(rejection = ?err, "unhandled rejection");
        ApiError::NotFound("no such route".to_string())
    };
    Ok(api.into_response())
}
