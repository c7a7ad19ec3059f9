use serde::{Deserialize, Serialize};

use super::AggregateStatus;

/// Pipeline stage a job belongs to. Stages run strictly parse -> chunk -> embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Parse,
    Chunk,
    Embed,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Parse, JobKind::Chunk, JobKind::Embed];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Parse => "parse",
            JobKind::Chunk => "chunk",
            JobKind::Embed => "embed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "parse" => Ok(JobKind::Parse),
            "chunk" => Ok(JobKind::Chunk),
            "embed" => Ok(JobKind::Embed),
            other => Err(format!("invalid job kind: {}", other)),
        }
    }

    /// Stage enqueued after this one completes.
    pub fn next(&self) -> Option<JobKind> {
        match self {
            JobKind::Parse => Some(JobKind::Chunk),
            JobKind::Chunk => Some(JobKind::Embed),
            JobKind::Embed => None,
        }
    }

    /// Document status while this stage is running.
    pub fn running_status(&self) -> AggregateStatus {
        match self {
            JobKind::Parse => AggregateStatus::Parsing,
            JobKind::Chunk => AggregateStatus::Chunking,
            JobKind::Embed => AggregateStatus::Embedding,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order() {
        assert_eq!(JobKind::Parse.next(), Some(JobKind::Chunk));
        assert_eq!(JobKind::Chunk.next(), Some(JobKind::Embed));
        assert_eq!(JobKind::Embed.next(), None);
    }

    #[test]
    fn round_trip() {
        for kind in JobKind::ALL {
            assert_eq!(JobKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }
}
