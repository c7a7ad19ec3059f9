use thiserror::Error;

use crate::domain::entities::NewElement;

#[derive(Debug, Error)]
pub enum ParseError {
    /// Terminal after the retry budget; the document stays at its last
    /// successful stage.
    #[error("parse failed: {0}")]
    Failed(String),

    #[error("unsupported mime type: {0}")]
    UnsupportedMime(String),
}

/// Converts raw bytes into the ordered element stream. Implementations are
/// CPU-bound and synchronous; the job runner moves them off the async
/// executor. A region that cannot be parsed degrades to a single `other`
/// element with best-effort text rather than failing the document.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<NewElement>, ParseError>;

    fn can_parse(&self, mime: &str) -> bool;
}
