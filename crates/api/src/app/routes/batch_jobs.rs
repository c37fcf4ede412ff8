use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use catalogsync_core::JobId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/:id", get(get_job).delete(delete_job))
        .route("/:id/status", put(update_status))
        .route("/:id/items", get(list_items))
        .route("/:id/logs", get(list_logs))
}

fn parse_job_id(raw: &str) -> Result<JobId, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id("batch job"))
}

pub async fn create_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateBatchJobRequest>,
) -> axum::response::Response {
    let command = match body.into_command() {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match services
        .batch_jobs
        .create(&principal.principal(), command)
        .await
    {
        Ok(job) => (StatusCode::CREATED, Json(dto::job_to_json(&job))).into_response(),
        Err(e) => errors::batch_error_to_response(e),
    }
}

pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ListJobsQuery>,
) -> axum::response::Response {
    let filter = match query.filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match services
        .batch_jobs
        .list_jobs(&principal.principal(), filter, query.page, query.page_size)
        .await
    {
        Ok(page) => (StatusCode::OK, Json(dto::jobs_page_to_json(&page))).into_response(),
        Err(e) => errors::batch_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_job_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.batch_jobs.get(&principal.principal(), id).await {
        Ok(job) => (StatusCode::OK, Json(dto::job_to_json(&job))).into_response(),
        Err(e) => errors::batch_error_to_response(e),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateStatusRequest>,
) -> axum::response::Response {
    let id = match parse_job_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let target = match dto::parse_job_status(&body.status) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match services
        .batch_jobs
        .update_status(&principal.principal(), id, target)
        .await
    {
        Ok(job) => (StatusCode::OK, Json(dto::job_to_json(&job))).into_response(),
        Err(e) => errors::batch_error_to_response(e),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::ListItemsQuery>,
) -> axum::response::Response {
    let id = match parse_job_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let filter = match query.filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match services
        .batch_jobs
        .list_items(&principal.principal(), id, filter, query.page, query.page_size)
        .await
    {
        Ok(page) => (StatusCode::OK, Json(dto::items_page_to_json(&page))).into_response(),
        Err(e) => errors::batch_error_to_response(e),
    }
}

pub async fn list_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_job_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.batch_jobs.list_logs(&principal.principal(), id).await {
        Ok(logs) => (StatusCode::OK, Json(dto::logs_to_json(&logs))).into_response(),
        Err(e) => errors::batch_error_to_response(e),
    }
}

pub async fn delete_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_job_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.batch_jobs.delete(&principal.principal(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::batch_error_to_response(e),
    }
}
