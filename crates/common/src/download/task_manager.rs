//! TaskManager REST client
//!
//! The TaskManager generates PDF and EPUB files outside the viewer. Jobs are
//! submitted with `POST {url}tasks` and polled with `GET {url}tasks/{identifier}`.

use crate::config::DownloadConfig;
use crate::db::models::{DownloadJobType, JobStatus};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Task submitted to the TaskManager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRequest {
    pub identifier: String,
    #[serde(rename = "type")]
    pub job_type: DownloadJobType,
    pub pi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logid: Option<String>,
    /// Path the generated file must be written to
    pub target_path: String,
}

/// Task state as reported by the TaskManager
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "queuePosition", alias = "queue_position")]
    pub queue_position: Option<i32>,
}

impl TaskStatus {
    pub fn job_status(&self) -> JobStatus {
        JobStatus::from(self.status.as_str())
    }
}

#[async_trait]
pub trait TaskManagerApi: Send + Sync {
    async fn submit(&self, task: &TaskRequest) -> Result<TaskStatus>;

    async fn status(&self, identifier: &str) -> Result<TaskStatus>;

    /// Position of the task in the generation queue, if it is still queued
    async fn queue_position(&self, identifier: &str) -> Result<Option<i32>> {
        Ok(self.status(identifier).await?.queue_position)
    }
}

fn upstream(message: String) -> AppError {
    AppError::Upstream {
        service: "taskmanager".to_string(),
        message,
    }
}

/// reqwest based TaskManager client retrying failed calls with exponential backoff
pub struct TaskManagerClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl TaskManagerClient {
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create TaskManager client: {}", e),
            })?;

        let base_url = if config.task_manager_url.ends_with('/') {
            config.task_manager_url.clone()
        } else {
            format!("{}/", config.task_manager_url)
        };

        Ok(Self {
            client,
            base_url,
            max_retries: config.max_retries,
        })
    }

    fn policy() -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(5),
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        }
    }

    /// Run a request, retrying transport errors and 5xx answers at most `max_retries` times
    async fn send<F>(&self, build: F) -> Result<TaskStatus>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let build = &build;
        let max_retries = self.max_retries;

        retry(Self::policy(), || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed);
            let give_up = |e: AppError| {
                if attempt >= max_retries {
                    backoff::Error::permanent(e)
                } else {
                    warn!(attempt = attempt + 1, error = %e, "TaskManager request failed, retrying");
                    backoff::Error::transient(e)
                }
            };

            let response = build()
                .send()
                .await
                .map_err(|e| give_up(upstream(format!("Request failed: {}", e))))?;

            let status = response.status();
            if status.is_server_error() {
                return Err(give_up(upstream(format!("TaskManager answered {}", status))));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(upstream(format!(
                    "TaskManager answered {}",
                    status
                ))));
            }

            response
                .json::<TaskStatus>()
                .await
                .map_err(|e| backoff::Error::permanent(upstream(format!("Unreadable answer: {}", e))))
        })
        .await
    }
}

#[async_trait]
impl TaskManagerApi for TaskManagerClient {
    async fn submit(&self, task: &TaskRequest) -> Result<TaskStatus> {
        let url = format!("{}tasks", self.base_url);
        debug!(identifier = %task.identifier, pi = %task.pi, "Submitting download task");
        self.send(|| self.client.post(&url).json(task)).await
    }

    async fn status(&self, identifier: &str) -> Result<TaskStatus> {
        let url = format!("{}tasks/{}", self.base_url, identifier);
        self.send(|| self.client.get(&url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_request_json() {
        let task = TaskRequest {
            identifier: "abc".into(),
            job_type: DownloadJobType::Epub,
            pi: "PPN1".into(),
            logid: None,
            target_path: "/tmp/epub/abc.epub".into(),
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "epub");
        assert!(json.get("logid").is_none());
    }

    #[test]
    fn test_task_status_json() {
        let status: TaskStatus =
            serde_json::from_str(r#"{"status":"WAITING","queuePosition":3}"#).unwrap();
        assert_eq!(status.job_status(), JobStatus::Waiting);
        assert_eq!(status.queue_position, Some(3));

        let empty: TaskStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.job_status(), JobStatus::Undefined);
    }

    #[test]
    fn test_client_normalizes_base_url() {
        let config = DownloadConfig {
            task_manager_url: "http://localhost:8080/taskmanager".into(),
            ..DownloadConfig::default()
        };
        let client = TaskManagerClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/taskmanager/");
    }
}
