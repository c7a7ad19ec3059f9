use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use super::db_err;
use crate::domain::entities::Job;
use crate::domain::repositories::{JobRepository, RepositoryError};
use crate::domain::value_objects::{JobKind, JobStatus, TenantId};
use crate::infrastructure::database::models::{JobModel, NewJobModel};
use crate::infrastructure::database::schema::{documents, jobs};
use crate::infrastructure::database::{DbPool, get_connection};

pub struct PostgresJobRepository {
    pool: DbPool,
}

impl PostgresJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    async fn enqueue(&self, document_id: i64, kind: JobKind) -> Result<Job, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        let inserted = diesel::insert_into(jobs::table)
            .values(NewJobModel::queued(document_id, kind))
            .returning(JobModel::as_returning())
            .get_result::<JobModel>(&mut conn);

        match inserted {
            Ok(model) => Job::try_from(model),
            // The partial unique index on (document_id, kind) for non-terminal
            // rows fired: a stage is already queued or running. Hand back the
            // existing job instead of duplicating work.
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                let model = jobs::table
                    .filter(jobs::document_id.eq(document_id))
                    .filter(jobs::kind.eq(kind.as_str()))
                    .filter(jobs::status.eq_any(["queued", "running"]))
                    .select(JobModel::as_select())
                    .first::<JobModel>(&mut conn)
                    .map_err(db_err)?;
                Job::try_from(model)
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn claim(&self, kind: JobKind) -> Result<Option<Job>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        let claimed = conn
            .transaction::<Option<JobModel>, DieselError, _>(|conn| {
                let candidate: Option<i64> = jobs::table
                    .filter(jobs::kind.eq(kind.as_str()))
                    .filter(jobs::status.eq(JobStatus::Queued.as_str()))
                    .filter(jobs::run_at.le(Utc::now()))
                    .order(jobs::id.asc())
                    .select(jobs::id)
                    .for_update()
                    .skip_locked()
                    .first(conn)
                    .optional()?;

                match candidate {
                    Some(id) => {
                        let model = diesel::update(jobs::table.filter(jobs::id.eq(id)))
                            .set((
                                jobs::status.eq(JobStatus::Running.as_str()),
                                jobs::progress.eq(0),
                                jobs::attempts.eq(jobs::attempts + 1),
                                jobs::updated_at.eq(Utc::now()),
                            ))
                            .returning(JobModel::as_returning())
                            .get_result::<JobModel>(conn)?;
                        Ok(Some(model))
                    }
                    None => Ok(None),
                }
            })
            .map_err(db_err)?;

        claimed.map(Job::try_from).transpose()
    }

    async fn save(&self, job: &Job) -> Result<(), RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        diesel::update(jobs::table.filter(jobs::id.eq(job.id)))
            .set((
                jobs::status.eq(job.status.as_str()),
                jobs::progress.eq(job.progress),
                jobs::error.eq(job.error.clone()),
                jobs::run_at.eq(job.run_at),
                jobs::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_progress(&self, job_id: i64, progress: i32) -> Result<(), RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        diesel::update(jobs::table.filter(jobs::id.eq(job_id)))
            .set((
                jobs::progress.eq(progress.clamp(0, 100)),
                jobs::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_for_tenant(
        &self,
        tenant: &TenantId,
        job_id: i64,
    ) -> Result<Job, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let model = jobs::table
            .inner_join(documents::table)
            .filter(jobs::id.eq(job_id))
            .filter(documents::tenant_id.eq(tenant.as_str()))
            .select(JobModel::as_select())
            .first::<JobModel>(&mut conn)
            .optional()
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound {
                entity: "job",
                id: job_id,
            })?;
        Job::try_from(model)
    }

    async fn list_for_document(
        &self,
        tenant: &TenantId,
        document_id: i64,
    ) -> Result<Vec<Job>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let models = jobs::table
            .inner_join(documents::table)
            .filter(jobs::document_id.eq(document_id))
            .filter(documents::tenant_id.eq(tenant.as_str()))
            .order(jobs::id.asc())
            .select(JobModel::as_select())
            .load::<JobModel>(&mut conn)
            .map_err(db_err)?;
        models.into_iter().map(Job::try_from).collect()
    }
}
