use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::{Document, Job};
use crate::domain::value_objects::{AggregateStatus, JobKind, JobStatus};

#[derive(Debug, Serialize)]
pub struct IngestAcceptedDto {
    pub job_id: i64,
    pub document_id: i64,
    pub status: JobStatus,
}

impl IngestAcceptedDto {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            document_id: job.document_id,
            status: job.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobStatusDto {
    pub job_id: i64,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: i32,
    pub document_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for JobStatusDto {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            kind: job.kind,
            status: job.status,
            progress: job.progress,
            document_id: job.document_id,
            created_at: job.created_at,
            updated_at: job.updated_at,
            error: job.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentStatusDto {
    pub document_id: i64,
    pub status: AggregateStatus,
    pub jobs: Vec<JobStatusDto>,
}

impl DocumentStatusDto {
    pub fn new(document: Document, jobs: Vec<Job>) -> Self {
        Self {
            document_id: document.id,
            status: document.aggregate_status,
            jobs: jobs.into_iter().map(JobStatusDto::from).collect(),
        }
    }
}
