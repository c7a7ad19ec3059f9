pub mod document_parser;
pub mod embedding_provider;
pub mod event_bus;
pub mod llm_provider;
pub mod object_store;
pub mod reranker;
pub mod vector_index;

pub use document_parser::{DocumentParser, ParseError};
pub use embedding_provider::{EmbeddingError, EmbeddingProvider};
pub use event_bus::{BusError, BusRecv, BusSubscription, EventBus};
pub use llm_provider::{ChatMessage, GenerationParams, LlmError, LlmProvider, LlmResponse};
pub use object_store::{ObjectStore, StorageError};
pub use reranker::{RerankError, RerankResult, Reranker};
pub use vector_index::{IndexError, ScoredChunk, VectorIndex};
