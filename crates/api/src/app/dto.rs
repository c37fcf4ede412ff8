use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use catalogsync_batch::{BatchJob, ItemStatus, ItemType, JobKind, JobStatus, LogEntry};
use catalogsync_catalog::ProductFilter;
use catalogsync_core::{ProductId, UserId};
use catalogsync_infra::jobs::{
    CreateBatchJob, ItemFilter, ItemSource, ItemView, JobFilter, JobSummary, Page,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateBatchJobRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub params: Value,
    pub product_ids: Option<Vec<String>>,
    pub filter: Option<ProductFilter>,
    pub items: Option<Vec<ItemInput>>,
    pub priority: Option<u8>,
    #[serde(default)]
    pub start_immediately: bool,
}

#[derive(Debug, Deserialize)]
pub struct ItemInput {
    pub item_id: String,
    #[serde(default)]
    pub item_type: ItemType,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub status: Option<String>,
    pub created_by: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListItemsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<String>,
}

impl CreateBatchJobRequest {
    pub fn into_command(self) -> Result<CreateBatchJob, axum::response::Response> {
        let kind = parse_job_kind(&self.job_type)?;

        let source = if let Some(items) = self.items {
            ItemSource::Items(items.into_iter().map(|i| (i.item_id, i.item_type)).collect())
        } else if let Some(ids) = self.product_ids {
            let ids = ids
                .iter()
                .map(|raw| raw.parse::<ProductId>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| errors::invalid_id("product"))?;
            ItemSource::ProductIds(ids)
        } else if let Some(filter) = self.filter {
            ItemSource::Filter(filter)
        } else {
            return Err(errors::json_error(
                axum::http::StatusCode::BAD_REQUEST,
                "validation_error",
                "one of product_ids, filter or items is required",
            ));
        };

        Ok(CreateBatchJob {
            name: self.name,
            description: self.description,
            kind,
            params: self.params,
            source,
            priority: self.priority,
            start_immediately: self.start_immediately,
        })
    }
}

impl ListJobsQuery {
    pub fn filter(&self) -> Result<JobFilter, axum::response::Response> {
        let created_by = match &self.created_by {
            Some(raw) => Some(raw.parse::<UserId>().map_err(|_| errors::invalid_id("user"))?),
            None => None,
        };
        Ok(JobFilter {
            kind: self.job_type.as_deref().map(parse_job_kind).transpose()?,
            status: self.status.as_deref().map(parse_job_status).transpose()?,
            created_by,
            created_from: self.created_from,
            created_to: self.created_to,
        })
    }
}

impl ListItemsQuery {
    pub fn filter(&self) -> Result<ItemFilter, axum::response::Response> {
        let status = match self.status.as_deref() {
            Some(raw) => Some(raw.parse::<ItemStatus>().map_err(|msg| {
                errors::json_error(axum::http::StatusCode::BAD_REQUEST, "invalid_status", msg)
            })?),
            None => None,
        };
        Ok(ItemFilter { status })
    }
}

pub fn parse_job_kind(s: &str) -> Result<JobKind, axum::response::Response> {
    s.parse::<JobKind>().map_err(|_| {
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_job_type",
            format!("unknown job type: {s}"),
        )
    })
}

pub fn parse_job_status(s: &str) -> Result<JobStatus, axum::response::Response> {
    s.parse::<JobStatus>()
        .map_err(|msg| errors::json_error(axum::http::StatusCode::BAD_REQUEST, "invalid_status", msg))
}

// -------------------------
// Response mapping
// -------------------------

pub fn job_to_json(job: &BatchJob) -> Value {
    json!({
        "id": job.id.to_string(),
        "name": job.name,
        "description": job.description,
        "type": job.kind().as_str(),
        "params": job.params.config(),
        "status": job.status.as_str(),
        "items": job.items,
        "progress": job.progress,
        "priority": job.priority,
        "created_by": job.created_by.to_string(),
        "created_at": job.created_at,
        "updated_at": job.updated_at,
        "started_at": job.started_at,
        "completed_at": job.completed_at,
        "logs": job.logs,
    })
}

pub fn summary_to_json(job: &JobSummary) -> Value {
    json!({
        "id": job.id.to_string(),
        "name": job.name,
        "description": job.description,
        "type": job.kind.as_str(),
        "status": job.status.as_str(),
        "progress": job.progress,
        "priority": job.priority,
        "created_by": job.created_by.to_string(),
        "created_at": job.created_at,
        "updated_at": job.updated_at,
        "started_at": job.started_at,
        "completed_at": job.completed_at,
    })
}

pub fn jobs_page_to_json(page: &Page<JobSummary>) -> Value {
    json!({
        "jobs": page.items.iter().map(summary_to_json).collect::<Vec<_>>(),
        "page": page.page,
        "pages": page.pages,
        "total": page.total,
    })
}

pub fn items_page_to_json(page: &Page<ItemView>) -> Value {
    json!({
        "items": page.items,
        "page": page.page,
        "pages": page.pages,
        "total": page.total,
    })
}

pub fn logs_to_json(logs: &[LogEntry]) -> Value {
    json!({ "logs": logs })
}
