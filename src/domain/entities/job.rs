use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_objects::{JobKind, JobStatus};

#[derive(Debug, Error, PartialEq)]
#[error("job {job_id} cannot go from {from} to {to}")]
pub struct InvalidTransition {
    pub job_id: i64,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One unit of deferred work: a single pipeline stage for a single document.
///
/// ```text
/// queued -> running -> done
///               \-> failed          (terminal)
///               \-> queued          (retry with backoff)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub document_id: i64,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: i32,
    pub error: Option<String>,
    pub attempts: i32,
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    fn transition(&mut self, to: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(to) {
            return Err(InvalidTransition {
                job_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Running)?;
        self.progress = 0;
        self.attempts += 1;
        Ok(())
    }

    /// Progress only moves forward; events derived from it stay monotonic.
    pub fn report_progress(&mut self, progress: i32) {
        if self.status == JobStatus::Running {
            self.progress = progress.clamp(self.progress, 100);
            self.updated_at = Utc::now();
        }
    }

    pub fn complete(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Done)?;
        self.progress = 100;
        self.error = None;
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Put the job back in the queue after a retryable failure. `delay` is the
    /// backoff computed by the runner; `run_at` gates the next claim.
    pub fn requeue(
        &mut self,
        error: impl Into<String>,
        delay: Duration,
    ) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Queued)?;
        self.error = Some(error.into());
        self.progress = 0;
        self.run_at = Utc::now() + delay;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued_job() -> Job {
        Job {
            id: 1,
            document_id: 7,
            kind: JobKind::Parse,
            status: JobStatus::Queued,
            progress: 0,
            error: None,
            attempts: 0,
            run_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn happy_path() {
        let mut job = queued_job();
        job.start().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.attempts, 1);

        job.report_progress(40);
        job.report_progress(80);
        job.complete().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.progress, 100);
        assert!(job.error.is_none());
    }

    #[test]
    fn progress_never_regresses() {
        let mut job = queued_job();
        job.start().unwrap();
        job.report_progress(60);
        job.report_progress(20);
        assert_eq!(job.progress, 60);
    }

    #[test]
    fn failure_records_error() {
        let mut job = queued_job();
        job.start().unwrap();
        job.fail("boom").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.is_terminal());
    }

    #[test]
    fn requeue_sets_backoff_gate() {
        let mut job = queued_job();
        job.start().unwrap();
        let before = Utc::now();
        job.requeue("transient", Duration::seconds(30)).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.run_at >= before + Duration::seconds(29));
    }

    #[test]
    fn cannot_complete_before_start() {
        let mut job = queued_job();
        assert!(job.complete().is_err());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut job = queued_job();
        job.start().unwrap();
        job.complete().unwrap();
        assert!(job.start().is_err());
        assert!(job.fail("late").is_err());
    }
}
