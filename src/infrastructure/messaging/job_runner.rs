//! Stage workers: claim one job, run its routine, publish progress along the
//! way, then either enqueue the next stage or retry/fail. Delivery is
//! at-least-once; every stage writes through replace/upsert semantics keyed
//! by document id, so a re-run converges on the same state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use pgvector::Vector;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::ports::{
    EmbeddingError, EmbeddingProvider, EventBus, ParseError, ObjectStore, StorageError,
};
use crate::application::services::chunker::Chunker;
use crate::domain::entities::{Document, Job};
use crate::domain::events::{JobEvent, JobPhase};
use crate::domain::repositories::{
    ChunkRepository, DocumentRepository, ElementRepository, EmbeddingRepository, JobRepository,
    RepositoryError,
};
use crate::domain::value_objects::{AggregateStatus, JobKind};
use crate::infrastructure::external_services::parsers::CompositeParser;

#[derive(Debug, Error)]
enum StageError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("stage routine panicked: {0}")]
    Panicked(String),
}

impl StageError {
    fn is_retryable(&self) -> bool {
        match self {
            StageError::Storage(e) => e.is_retryable(),
            StageError::Embedding(e) => e.is_retryable(),
            StageError::Repository(e) => e.is_retryable(),
            StageError::Parse(_) | StageError::Panicked(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobRunnerConfig {
    pub max_attempts: i32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub workers_per_kind: usize,
    pub poll_interval: Duration,
}

impl Default for JobRunnerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(60),
            workers_per_kind: 2,
            poll_interval: Duration::from_millis(500),
        }
    }
}

pub struct JobRunner {
    documents: Arc<dyn DocumentRepository>,
    jobs: Arc<dyn JobRepository>,
    elements: Arc<dyn ElementRepository>,
    chunks: Arc<dyn ChunkRepository>,
    embeddings: Arc<dyn EmbeddingRepository>,
    store: Arc<dyn ObjectStore>,
    parser: Arc<CompositeParser>,
    embedder: Arc<dyn EmbeddingProvider>,
    bus: Arc<dyn EventBus>,
    chunker: Chunker,
    config: JobRunnerConfig,
    publish_failures: AtomicU64,
}

impl JobRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        jobs: Arc<dyn JobRepository>,
        elements: Arc<dyn ElementRepository>,
        chunks: Arc<dyn ChunkRepository>,
        embeddings: Arc<dyn EmbeddingRepository>,
        store: Arc<dyn ObjectStore>,
        parser: Arc<CompositeParser>,
        embedder: Arc<dyn EmbeddingProvider>,
        bus: Arc<dyn EventBus>,
        chunker: Chunker,
        config: JobRunnerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            documents,
            jobs,
            elements,
            chunks,
            embeddings,
            store,
            parser,
            embedder,
            bus,
            chunker,
            config,
            publish_failures: AtomicU64::new(0),
        })
    }

    /// Spawn the worker pool: `workers_per_kind` independent tasks per queue
    /// kind, each claiming and running one job at a time.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for kind in JobKind::ALL {
            for worker in 0..self.config.workers_per_kind {
                let runner = self.clone();
                handles.push(tokio::spawn(async move {
                    runner.worker_loop(kind, worker).await;
                }));
            }
        }
        handles
    }

    async fn worker_loop(&self, kind: JobKind, worker: usize) {
        info!(kind = %kind, worker, "worker started");
        loop {
            match self.jobs.claim(kind).await {
                Ok(Some(job)) => self.run_job(job).await,
                Ok(None) => tokio::time::sleep(self.config.poll_interval).await,
                Err(e) => {
                    warn!(kind = %kind, worker, error = %e, "claim failed");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    async fn run_job(&self, mut job: Job) {
        let document = match self.documents.find(job.document_id).await {
            Ok(document) => document,
            Err(e) => {
                error!(job_id = job.id, error = %e, "document lookup failed");
                if !e.is_retryable() {
                    let _ = job.fail(e.to_string());
                    let _ = self.jobs.save(&job).await;
                }
                return;
            }
        };

        info!(
            job_id = job.id,
            document_id = document.id,
            kind = %job.kind,
            attempt = job.attempts,
            "job started"
        );
        if let Err(e) = self
            .documents
            .set_status(document.id, job.kind.running_status())
            .await
        {
            warn!(job_id = job.id, error = %e, "failed to set document status");
        }
        self.publish(&document, &job, JobPhase::Started).await;

        let result = match job.kind {
            JobKind::Parse => self.run_parse(&document, &mut job).await,
            JobKind::Chunk => self.run_chunk(&document, &mut job).await,
            JobKind::Embed => self.run_embed(&document, &mut job).await,
        };

        match result {
            Ok(()) => self.finish(&document, &mut job).await,
            Err(e) => self.handle_failure(&document, &mut job, e).await,
        }
    }

    async fn finish(&self, document: &Document, job: &mut Job) {
        if job.complete().is_err() {
            return;
        }
        if let Err(e) = self.jobs.save(job).await {
            error!(job_id = job.id, error = %e, "failed to persist job completion");
            return;
        }
        self.publish(document, job, JobPhase::Done).await;
        info!(job_id = job.id, kind = %job.kind, "job done");

        if let Some(next) = job.kind.next() {
            match self.jobs.enqueue(document.id, next).await {
                Ok(next_job) => {
                    info!(
                        document_id = document.id,
                        job_id = next_job.id,
                        kind = %next,
                        "next stage queued"
                    );
                }
                Err(e) => {
                    error!(document_id = document.id, error = %e, "failed to enqueue next stage");
                }
            }
        }
    }

    async fn handle_failure(&self, document: &Document, job: &mut Job, error: StageError) {
        if error.is_retryable() && job.attempts < self.config.max_attempts {
            let delay = self.backoff_for(job.attempts);
            warn!(
                job_id = job.id,
                attempt = job.attempts,
                delay_ms = delay.num_milliseconds(),
                error = %error,
                "retryable stage failure, requeueing"
            );
            if job.requeue(error.to_string(), delay).is_ok() {
                if let Err(e) = self.jobs.save(job).await {
                    error!(job_id = job.id, error = %e, "failed to requeue job");
                }
            }
            return;
        }

        error!(job_id = job.id, kind = %job.kind, error = %error, "job failed terminally");
        if job.fail(error.to_string()).is_ok() {
            if let Err(e) = self.jobs.save(job).await {
                error!(job_id = job.id, error = %e, "failed to persist job failure");
            }
        }
        if let Err(e) = self
            .documents
            .set_status(document.id, AggregateStatus::Failed)
            .await
        {
            warn!(document_id = document.id, error = %e, "failed to mark document failed");
        }
        self.publish(document, job, JobPhase::Failed).await;
    }

    fn backoff_for(&self, attempts: i32) -> ChronoDuration {
        let backoff = backoff_duration(self.config.backoff_base, self.config.backoff_max, attempts);
        ChronoDuration::from_std(backoff).unwrap_or_else(|_| ChronoDuration::seconds(60))
    }

    async fn report(&self, document: &Document, job: &mut Job, progress: i32) {
        job.report_progress(progress);
        if let Err(e) = self.jobs.update_progress(job.id, job.progress).await {
            warn!(job_id = job.id, error = %e, "failed to persist progress");
        }
        self.publish(document, job, JobPhase::Progress).await;
    }

    async fn publish(&self, document: &Document, job: &Job, phase: JobPhase) {
        let event = JobEvent::for_job(&document.tenant_id, job, phase);
        if let Err(e) = self.bus.publish(&event).await {
            // Progress is advisory; the metadata store stays authoritative.
            self.publish_failures.fetch_add(1, Ordering::Relaxed);
            warn!(job_id = job.id, error = %e, "event publish failed");
        }
    }

    pub fn publish_failure_count(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }

    async fn run_parse(&self, document: &Document, job: &mut Job) -> Result<(), StageError> {
        self.report(document, job, 10).await;
        let bytes = self.store.get(&document.storage_uri).await?;
        self.report(document, job, 30).await;

        // Parsing is CPU-bound; keep it off the async executor.
        let parser = self.parser.clone();
        let mime = document.mime.clone();
        let parsed = tokio::task::spawn_blocking(move || parser.parse_mime(&mime, &bytes))
            .await
            .map_err(|e| StageError::Panicked(e.to_string()))??;
        self.report(document, job, 70).await;

        let count = self
            .elements
            .replace_for_document(document.id, parsed, AggregateStatus::Parsing)
            .await?;
        info!(document_id = document.id, elements = count, "elements stored");
        self.report(document, job, 90).await;
        Ok(())
    }

    async fn run_chunk(&self, document: &Document, job: &mut Job) -> Result<(), StageError> {
        self.report(document, job, 10).await;
        let elements = self.elements.list_for_document(document.id).await?;
        self.report(document, job, 30).await;

        let chunks = self.chunker.build(&elements);
        self.report(document, job, 60).await;

        let stored = self
            .chunks
            .replace_for_document(document.id, chunks, AggregateStatus::Chunking)
            .await?;
        info!(document_id = document.id, chunks = stored.len(), "chunks stored");
        self.report(document, job, 90).await;
        Ok(())
    }

    async fn run_embed(&self, document: &Document, job: &mut Job) -> Result<(), StageError> {
        self.report(document, job, 5).await;
        let chunks = self.chunks.list_for_document(document.id).await?;
        if chunks.is_empty() {
            self.embeddings
                .upsert_for_document(document.id, Vec::new(), self.embedder.provider_tag(), AggregateStatus::Ready)
                .await?;
            return Ok(());
        }

        let batch_size = self.embedder.batch_size().max(1);
        let total = chunks.len();
        let mut rows: Vec<(i64, Vector)> = Vec::with_capacity(total);

        for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(StageError::Embedding(EmbeddingError::InvalidResponse(
                    format!("expected {} vectors, got {}", batch.len(), vectors.len()),
                )));
            }
            for (chunk, vector) in batch.iter().zip(vectors) {
                rows.push((chunk.id, vector));
            }
            let done = (batch_index + 1) * batch_size;
            let progress = 10 + (80 * done.min(total) / total) as i32;
            self.report(document, job, progress).await;
        }

        let written = self
            .embeddings
            .upsert_for_document(
                document.id,
                rows,
                self.embedder.provider_tag(),
                AggregateStatus::Ready,
            )
            .await?;
        info!(document_id = document.id, embeddings = written, "embeddings stored");
        self.report(document, job, 95).await;
        Ok(())
    }
}

/// Exponential backoff from the attempt just finished, capped.
fn backoff_duration(base: Duration, max: Duration, attempts: i32) -> Duration {
    let exponent = attempts.clamp(1, 20) as u32 - 1;
    base.saturating_mul(2u32.saturating_pow(exponent)).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(StageError::Storage(StorageError::Unavailable("io".into())).is_retryable());
        assert!(
            StageError::Embedding(EmbeddingError::Unavailable("down".into())).is_retryable()
        );
        assert!(StageError::Repository(RepositoryError::Unavailable("db".into())).is_retryable());

        assert!(!StageError::Parse(ParseError::Failed("bad".into())).is_retryable());
        assert!(!StageError::Storage(StorageError::NotFound("gone".into())).is_retryable());
        assert!(
            !StageError::Storage(StorageError::PayloadTooLarge { size: 2, limit: 1 })
                .is_retryable()
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(5);
        assert_eq!(backoff_duration(base, max, 1), Duration::from_millis(100));
        assert_eq!(backoff_duration(base, max, 2), Duration::from_millis(200));
        assert_eq!(backoff_duration(base, max, 3), Duration::from_millis(400));
        assert_eq!(backoff_duration(base, max, 10), Duration::from_secs(5));
        assert_eq!(backoff_duration(base, max, 0), Duration::from_millis(100));
    }
}
