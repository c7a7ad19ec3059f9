use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::entities::Job;
use crate::domain::repositories::RepositoryError;
use crate::domain::value_objects::{JobKind, JobStatus};
use crate::infrastructure::database::schema::jobs;

#[derive(Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name = jobs)]
pub struct JobModel {
    pub id: i64,
    pub document_id: i64,
    pub kind: String,
    pub status: String,
    pub progress: i32,
    pub error: Option<String>,
    pub attempts: i32,
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJobModel {
    pub document_id: i64,
    pub kind: String,
    pub status: String,
    pub progress: i32,
}

impl NewJobModel {
    pub fn queued(document_id: i64, kind: JobKind) -> Self {
        Self {
            document_id,
            kind: kind.as_str().to_string(),
            status: JobStatus::Queued.as_str().to_string(),
            progress: 0,
        }
    }
}

impl TryFrom<JobModel> for Job {
    type Error = RepositoryError;

    fn try_from(model: JobModel) -> Result<Self, Self::Error> {
        Ok(Job {
            id: model.id,
            document_id: model.document_id,
            kind: JobKind::from_str(&model.kind).map_err(RepositoryError::Corrupt)?,
            status: JobStatus::from_str(&model.status).map_err(RepositoryError::Corrupt)?,
            progress: model.progress,
            error: model.error,
            attempts: model.attempts,
            run_at: model.run_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
