pub mod answer;
pub mod answer_cache;
pub mod chunker;
pub mod ingest;
pub mod retriever;
pub mod token;

pub use answer::{
    AnswerConfig, AnswerError, AnswerEvent, AnswerRequest, AnswerResponse, AnswerService,
    Citation, UsageReport,
};
pub use answer_cache::AnswerCache;
pub use chunker::{Chunker, ChunkerConfig};
pub use ingest::{IngestError, IngestService};
pub use retriever::{
    Match, Retrieval, RetrievalConfig, RetrievalError, RetrievalRequest, RetrieverService,
};
pub use token::count_tokens;
