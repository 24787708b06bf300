//! Download job entity: PDF and EPUB generation requests handled by the TaskManager

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of file a job produces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadJobType {
    Pdf,
    Epub,
}

impl DownloadJobType {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadJobType::Pdf => "pdf",
            DownloadJobType::Epub => "epub",
        }
    }

    pub fn file_extension(self) -> &'static str {
        self.as_str()
    }
}

impl std::str::FromStr for DownloadJobType {
    type Err = crate::errors::AppError;

    fn from_str(s: &str) -> crate::errors::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(DownloadJobType::Pdf),
            "epub" => Ok(DownloadJobType::Epub),
            other => Err(crate::errors::AppError::validation(format!(
                "Unknown download type '{}'",
                other
            ))),
        }
    }
}

/// Job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Initialized,
    Waiting,
    Ready,
    Error,
    Undefined,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Initialized => "initialized",
            JobStatus::Waiting => "waiting",
            JobStatus::Ready => "ready",
            JobStatus::Error => "error",
            JobStatus::Undefined => "undefined",
        }
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "initialized" => JobStatus::Initialized,
            "waiting" => JobStatus::Waiting,
            "ready" => JobStatus::Ready,
            "error" => JobStatus::Error,
            _ => JobStatus::Undefined,
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "download_jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub job_type: String,

    /// SHA-256 hex of type, PI and LOGID
    #[sea_orm(column_type = "Text", unique)]
    pub identifier: String,

    #[sea_orm(column_type = "Text")]
    pub pi: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub logid: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub message: Option<String>,

    pub last_requested: DateTimeWithTimeZone,

    pub ttl_secs: i64,

    pub queue_position: Option<i32>,
}

impl Model {
    /// Get the job status as an enum
    pub fn job_status(&self) -> JobStatus {
        JobStatus::from(self.status.as_str())
    }

    pub fn download_type(&self) -> crate::errors::Result<DownloadJobType> {
        self.job_type.parse()
    }

    /// Expired once `last_requested + ttl` lies before `now`
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        let expires = self.last_requested.with_timezone(&chrono::Utc)
            + chrono::Duration::seconds(self.ttl_secs);
        expires < now
    }

    /// `{folder}/{type}/{identifier}.{ext}`
    pub fn file_path(&self, folder: &Path) -> PathBuf {
        folder
            .join(&self.job_type)
            .join(format!("{}.{}", self.identifier, self.job_type))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::download_job_observer::Entity")]
    Observers,
}

impl Related<super::download_job_observer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Observers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn job() -> Model {
        Model {
            id: 1,
            job_type: "pdf".to_string(),
            identifier: "abc".to_string(),
            pi: "PPN1".to_string(),
            logid: None,
            status: "waiting".to_string(),
            message: None,
            last_requested: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().into(),
            ttl_secs: 3600,
            queue_position: None,
        }
    }

    #[test]
    fn test_expiry() {
        let job = job();
        assert!(!job.is_expired(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()));
        assert!(job.is_expired(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 1).unwrap()));
    }

    #[test]
    fn test_file_path() {
        assert_eq!(
            job().file_path(Path::new("/var/downloads")),
            PathBuf::from("/var/downloads/pdf/abc.pdf")
        );
    }

    #[test]
    fn test_status_conversion() {
        assert_eq!(job().job_status(), JobStatus::Waiting);
        assert_eq!(JobStatus::from("READY"), JobStatus::Ready);
        assert_eq!(JobStatus::from("whatever"), JobStatus::Undefined);
        assert_eq!(String::from(JobStatus::Error), "error");
        assert_eq!("EPUB".parse::<DownloadJobType>().unwrap(), DownloadJobType::Epub);
        assert!("zip".parse::<DownloadJobType>().is_err());
    }
}
