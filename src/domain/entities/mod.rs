pub mod chunk;
pub mod document;
pub mod element;
pub mod embedding;
pub mod job;

pub use chunk::{Chunk, NewChunk};
pub use document::{Document, NewDocument};
pub use element::{Element, ElementKind, NewElement};
pub use embedding::Embedding;
pub use job::{InvalidTransition, Job};
