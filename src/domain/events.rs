use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::Job;
use crate::domain::value_objects::{JobKind, TenantId};

/// Wire payload published on `{tenant_id}.jobs` and relayed verbatim to
/// WebSocket subscribers. Progress events are advisory; the metadata store is
/// authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub event: String,
    pub job_id: i64,
    pub document_id: i64,
    pub tenant_id: String,
    pub kind: JobKind,
    pub progress: i32,
    pub error: Option<String>,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Started,
    Progress,
    Done,
    Failed,
}

impl JobPhase {
    fn suffix(&self) -> &'static str {
        match self {
            JobPhase::Started => "started",
            JobPhase::Progress => "progress",
            JobPhase::Done => "done",
            JobPhase::Failed => "failed",
        }
    }
}

impl JobEvent {
    pub fn for_job(tenant: &TenantId, job: &Job, phase: JobPhase) -> Self {
        Self {
            event: format!("{}_{}", job.kind.as_str(), phase.suffix()),
            job_id: job.id,
            document_id: job.document_id,
            tenant_id: tenant.as_str().to_string(),
            kind: job.kind,
            progress: job.progress,
            error: job.error.clone(),
            ts: Utc::now(),
        }
    }

    /// Handshake event sent once per WebSocket connection.
    pub fn connected(tenant: &TenantId) -> Self {
        Self {
            event: "connected".to_string(),
            job_id: 0,
            document_id: 0,
            tenant_id: tenant.as_str().to_string(),
            kind: JobKind::Parse,
            progress: 0,
            error: None,
            ts: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::JobStatus;

    #[test]
    fn event_names_follow_stage_and_phase() {
        let tenant = TenantId::new("acme").unwrap();
        let job = Job {
            id: 3,
            document_id: 9,
            kind: JobKind::Chunk,
            status: JobStatus::Running,
            progress: 40,
            error: None,
            attempts: 1,
            run_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let event = JobEvent::for_job(&tenant, &job, JobPhase::Progress);
        assert_eq!(event.event, "chunk_progress");
        assert_eq!(event.tenant_id, "acme");
        assert_eq!(event.progress, 40);
    }

    #[test]
    fn payload_serializes_wire_fields() {
        let tenant = TenantId::new("t1").unwrap();
        let value = serde_json::to_value(JobEvent::connected(&tenant)).unwrap();
        assert_eq!(value["event"], "connected");
        assert_eq!(value["tenant_id"], "t1");
        assert!(value["ts"].is_string());
    }
}
