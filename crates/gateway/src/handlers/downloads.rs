//! PDF/EPUB download job handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use viewer_common::{
    db::models::{DownloadJob, DownloadJobType, JobStatus},
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(rename = "type")]
    pub job_type: String,
    pub pi: String,
    pub logid: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadJobResponse {
    pub identifier: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub pi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logid: Option<String>,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<i32>,
    pub last_requested: String,
    pub ttl_secs: i64,
}

impl From<DownloadJob> for DownloadJobResponse {
    fn from(job: DownloadJob) -> Self {
        Self {
            status: job.job_status(),
            identifier: job.identifier,
            job_type: job.job_type,
            pi: job.pi,
            logid: job.logid,
            message: job.message,
            queue_position: job.queue_position,
            last_requested: job.last_requested.to_rfc3339(),
            ttl_secs: job.ttl_secs,
        }
    }
}

/// Jobs whose state may still change on the TaskManager side
fn is_pending(job: &DownloadJob) -> bool {
    matches!(job.job_status(), JobStatus::Initialized | JobStatus::Waiting)
}

pub async fn request_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<(StatusCode, Json<DownloadJobResponse>)> {
    let job_type: DownloadJobType = request.job_type.parse()?;
    let logid = request.logid.as_deref().map(str::trim).filter(|l| !l.is_empty());

    let job = state
        .downloads
        .request_download(job_type, &request.pi, logid, request.email.as_deref())
        .await?;

    let status = if job.job_status() == JobStatus::Ready {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(job.into())))
}

/// Current state of a job; pending jobs are refreshed from the TaskManager first
pub async fn download_status(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<DownloadJobResponse>> {
    let job = state
        .repo
        .find_download_job_by_identifier(&identifier)
        .await?
        .ok_or_else(|| AppError::DownloadJobNotFound {
            identifier: identifier.clone(),
        })?;

    if !is_pending(&job) {
        return Ok(Json(job.into()));
    }

    match state.downloads.refresh_status(job.clone()).await {
        Ok(job) => Ok(Json(job.into())),
        Err(e) => {
            // Report the stored state while the TaskManager is unavailable
            tracing::warn!(identifier = %identifier, error = %e, "Failed to refresh download job");
            Ok(Json(job.into()))
        }
    }
}
