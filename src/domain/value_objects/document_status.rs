use serde::{Deserialize, Serialize};

/// Aggregate pipeline status of a document, advanced stage by stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Uploaded,
    Parsing,
    Chunking,
    Embedding,
    Ready,
    Failed,
}

impl AggregateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateStatus::Uploaded => "uploaded",
            AggregateStatus::Parsing => "parsing",
            AggregateStatus::Chunking => "chunking",
            AggregateStatus::Embedding => "embedding",
            AggregateStatus::Ready => "ready",
            AggregateStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "uploaded" => Ok(AggregateStatus::Uploaded),
            "parsing" => Ok(AggregateStatus::Parsing),
            "chunking" => Ok(AggregateStatus::Chunking),
            "embedding" => Ok(AggregateStatus::Embedding),
            "ready" => Ok(AggregateStatus::Ready),
            "failed" => Ok(AggregateStatus::Failed),
            other => Err(format!("invalid aggregate status: {}", other)),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AggregateStatus::Ready | AggregateStatus::Failed)
    }
}

impl std::fmt::Display for AggregateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
