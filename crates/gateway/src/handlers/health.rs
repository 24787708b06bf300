//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::future::Future;
use std::time::Instant;

use crate::AppState;
use viewer_common::errors::Result;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
    pub search_index: CheckResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CheckResult>,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

async fn check<F: Future<Output = Result<()>>>(probe: F) -> CheckResult {
    let start = Instant::now();
    match probe.await {
        Ok(()) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: viewer_common::VERSION,
    })
}

/// Readiness probe - checks database, search index and cache
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let database = check(state.db.ping()).await;
    let search_index = check(state.search.ping()).await;
    let cache = match &state.cache {
        Some(cache) => Some(check(cache.ping()).await),
        None => None,
    };

    // The cache is optional; a dead cache degrades but does not block
    let all_healthy = database.is_up() && search_index.is_up();

    let status = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
            checks: HealthChecks {
                database,
                search_index,
                cache,
            },
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewer_common::errors::AppError;

    #[tokio::test]
    async fn test_health() {
        let Json(response) = health().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_check_reports_failures() {
        let up = check(async { Ok(()) }).await;
        assert!(up.is_up());
        assert!(up.latency_ms.is_some());

        let down = check(async {
            Err(AppError::IndexUnreachable {
                message: "connection refused".into(),
            })
        })
        .await;
        assert!(!down.is_up());
        assert!(down.error.unwrap().contains("connection refused"));
    }
}
