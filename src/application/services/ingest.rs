//! Upload intake: validate, persist the raw bytes, create the document row
//! and enqueue the first pipeline stage.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::application::ports::{DocumentParser, ObjectStore, StorageError};
use crate::domain::entities::{Document, Job, NewDocument};
use crate::domain::repositories::{DocumentRepository, JobRepository, RepositoryError};
use crate::domain::value_objects::{JobKind, TenantId};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported mime type: {0}")]
    UnsupportedMime(String),

    #[error("payload of {size} bytes exceeds the {limit} byte cap")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct IngestService {
    documents: Arc<dyn DocumentRepository>,
    jobs: Arc<dyn JobRepository>,
    store: Arc<dyn ObjectStore>,
    parser: Arc<dyn DocumentParser>,
    max_upload_bytes: u64,
}

impl IngestService {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        jobs: Arc<dyn JobRepository>,
        store: Arc<dyn ObjectStore>,
        parser: Arc<dyn DocumentParser>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            documents,
            jobs,
            store,
            parser,
            max_upload_bytes,
        }
    }

    /// Accept an upload and queue its parse job. Validation happens before
    /// any row or object is written: an oversize or unsupported payload
    /// leaves no trace behind.
    pub async fn upload(
        &self,
        tenant: &TenantId,
        name: &str,
        declared_mime: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<(Document, Job), IngestError> {
        let mime = resolve_mime(name, declared_mime);
        if !self.parser.can_parse(&mime) {
            return Err(IngestError::UnsupportedMime(mime));
        }
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(IngestError::PayloadTooLarge {
                size: bytes.len() as u64,
                limit: self.max_upload_bytes,
            });
        }

        let document = self
            .documents
            .create(NewDocument {
                tenant_id: tenant.clone(),
                name: name.to_string(),
                mime: mime.clone(),
                size_bytes: bytes.len() as i64,
                storage_uri: String::new(),
            })
            .await?;

        let digest = hex::encode(Sha256::digest(&bytes));
        let key = format!(
            "{}/{}/{}.{}",
            tenant.as_str(),
            document.id,
            digest,
            extension_of(name)
        );

        let uri = match self.store.put(&key, &bytes, &mime).await {
            Ok(uri) => uri,
            Err(e) => {
                // The row exists but the bytes never landed; compensate.
                if let Err(del) = self.documents.delete(document.id).await {
                    warn!(document_id = document.id, error = %del,
                        "failed to clean up document after storage error");
                }
                return Err(e.into());
            }
        };
        self.documents.set_storage_uri(document.id, &uri).await?;

        let job = self.jobs.enqueue(document.id, JobKind::Parse).await?;
        info!(
            document_id = document.id,
            job_id = job.id,
            tenant = %tenant,
            mime = %mime,
            "document accepted for ingest"
        );

        let mut document = document;
        document.storage_uri = uri;
        Ok((document, job))
    }

    pub async fn job_status(&self, tenant: &TenantId, job_id: i64) -> Result<Job, RepositoryError> {
        self.jobs.find_for_tenant(tenant, job_id).await
    }

    pub async fn document_status(
        &self,
        tenant: &TenantId,
        document_id: i64,
    ) -> Result<(Document, Vec<Job>), RepositoryError> {
        let document = self.documents.find_for_tenant(tenant, document_id).await?;
        let jobs = self.jobs.list_for_document(tenant, document_id).await?;
        Ok((document, jobs))
    }
}

fn extension_of(name: &str) -> &str {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .unwrap_or("bin")
}

/// Prefer the declared content type; fall back to the filename extension for
/// generic or absent declarations.
pub fn resolve_mime(name: &str, declared: Option<&str>) -> String {
    match declared {
        Some(mime) if !mime.is_empty() && mime != "application/octet-stream" => {
            mime.to_string()
        }
        _ => mime_from_extension(extension_of(name)),
    }
}

fn mime_from_extension(ext: &str) -> String {
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "html" | "htm" => "text/html",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "txt" | "text" | "log" => "text/plain",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "doc" => "application/msword",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_mime_wins_over_extension() {
        assert_eq!(
            resolve_mime("report.bin", Some("application/pdf")),
            "application/pdf"
        );
    }

    #[test]
    fn octet_stream_falls_back_to_extension() {
        assert_eq!(
            resolve_mime("notes.md", Some("application/octet-stream")),
            "text/markdown"
        );
        assert_eq!(resolve_mime("page.html", None), "text/html");
    }

    #[test]
    fn unknown_extension_stays_generic() {
        assert_eq!(resolve_mime("blob.xyz", None), "application/octet-stream");
    }

    #[test]
    fn extension_parsing_edge_cases() {
        assert_eq!(extension_of("noext"), "bin");
        assert_eq!(extension_of("trailing."), "bin");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
    }
}
