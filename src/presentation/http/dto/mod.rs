pub mod answer_dto;
pub mod chunk_dto;
pub mod ingest_dto;
pub mod query_dto;

pub use answer_dto::{AnswerRequestDto, AnswerResponseDto};
pub use chunk_dto::ChunkDto;
pub use ingest_dto::{DocumentStatusDto, IngestAcceptedDto, JobStatusDto};
pub use query_dto::{QueryRequestDto, QueryResponseDto, QueryUsageDto};
