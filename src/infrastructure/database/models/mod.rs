pub mod chunk_model;
pub mod document_model;
pub mod element_model;
pub mod embedding_model;
pub mod job_model;

pub use chunk_model::{ChunkModel, NewChunkModel};
pub use document_model::{DocumentModel, NewDocumentModel};
pub use element_model::{ElementModel, NewElementModel};
pub use embedding_model::{EmbeddingModel, UpsertEmbeddingModel};
pub use job_model::{JobModel, NewJobModel};
