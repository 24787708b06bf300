//! Download worker processor
//!
//! One pass asks the TaskManager about every pending job and then removes
//! expired jobs together with their files.

use std::time::Duration;
use tracing::{error, info, instrument, warn};
use viewer_common::{
    db::{models::JobStatus, Repository},
    download::DownloadService,
    errors::Result,
};

/// Statuses the TaskManager may still change
pub const PENDING: [JobStatus; 2] = [JobStatus::Initialized, JobStatus::Waiting];

/// Outcome of one polling pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    /// Jobs the TaskManager reported on
    pub refreshed: usize,
    /// Jobs whose status changed
    pub changed: usize,
    /// Jobs that became ready
    pub ready: usize,
    /// Jobs the TaskManager could not be asked about
    pub failed: usize,
    /// Expired jobs removed
    pub removed: usize,
}

impl PassSummary {
    /// A pass fails when jobs were pending and none of them could be refreshed
    pub fn is_failure(&self) -> bool {
        self.failed > 0 && self.refreshed == 0
    }
}

/// Pauses polling after repeated failed passes
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    consecutive_failures: u32,
    max_failures: u32,
    pause: Duration,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, pause: Duration) -> Self {
        Self {
            consecutive_failures: 0,
            max_failures,
            pause,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Pause to wait before the next pass; resets the breaker when open
    pub fn check(&mut self) -> Option<Duration> {
        if self.consecutive_failures < self.max_failures {
            return None;
        }
        warn!(failures = self.consecutive_failures, "Circuit breaker open, pausing...");
        self.consecutive_failures = 0;
        Some(self.pause)
    }
}

/// Download worker processor
pub struct DownloadProcessor {
    repository: Repository,
    downloads: DownloadService,
}

impl DownloadProcessor {
    pub fn new(repository: Repository, downloads: DownloadService) -> Self {
        Self {
            repository,
            downloads,
        }
    }

    /// Refresh pending jobs, then remove expired ones
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();

        for job in self.repository.download_jobs_by_status(&PENDING).await? {
            let previous = job.job_status();
            let identifier = job.identifier.clone();

            match self.downloads.refresh_status(job).await {
                Ok(job) => {
                    summary.refreshed += 1;
                    let status = job.job_status();
                    if status == previous {
                        continue;
                    }
                    summary.changed += 1;
                    if status == JobStatus::Ready {
                        summary.ready += 1;
                        self.announce_ready(job.id, &identifier).await;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(identifier = %identifier, error = %e, "Failed to refresh download job");
                }
            }
        }

        summary.removed = self.downloads.cleanup_expired().await?;

        info!(
            refreshed = summary.refreshed,
            changed = summary.changed,
            ready = summary.ready,
            failed = summary.failed,
            removed = summary.removed,
            "Download pass complete"
        );
        Ok(summary)
    }

    /// Log the observers waiting for a finished file; the TaskManager sends the mails
    async fn announce_ready(&self, job_id: i64, identifier: &str) {
        match self.repository.download_job_observers(job_id).await {
            Ok(observers) => info!(
                identifier = %identifier,
                observers = observers.len(),
                "Download ready"
            ),
            Err(e) => warn!(identifier = %identifier, error = %e, "Failed to load download observers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_failure() {
        assert!(!PassSummary::default().is_failure());
        let all_failed = PassSummary {
            failed: 3,
            ..PassSummary::default()
        };
        assert!(all_failed.is_failure());
        let partly = PassSummary {
            failed: 1,
            refreshed: 2,
            ..PassSummary::default()
        };
        assert!(!partly.is_failure());
    }

    #[test]
    fn test_circuit_breaker_opens_after_max_failures() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.check(), None);

        breaker.record_failure();
        assert_eq!(breaker.check(), Some(Duration::from_secs(30)));
        assert_eq!(breaker.failures(), 0);
        assert_eq!(breaker.check(), None);
    }

    #[test]
    fn test_success_resets_breaker() {
        let mut breaker = CircuitBreaker::new(2, Duration::from_secs(1));
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.check(), None);
    }

    #[test]
    fn test_pending_statuses() {
        assert!(PENDING.contains(&JobStatus::Waiting));
        assert!(!PENDING.contains(&JobStatus::Ready));
    }
}
