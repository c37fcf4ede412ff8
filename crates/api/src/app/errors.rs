use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use catalogsync_infra::jobs::BatchJobError;

pub fn batch_error_to_response(err: BatchJobError) -> axum::response::Response {
    match err {
        BatchJobError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "batch job not found"),
        BatchJobError::Forbidden => json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
        BatchJobError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        BatchJobError::InvalidTransition(e) => {
            json_error(StatusCode::CONFLICT, "invalid_transition", e.to_string())
        }
        BatchJobError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        BatchJobError::Store(e) => {
            tracing::error!(error = %e, "job store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        BatchJobError::Catalog(e) => {
            tracing::error!(error = %e, "catalog failure");
            json_error(StatusCode::BAD_GATEWAY, "catalog_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}
