pub mod local;
pub mod remote;

pub use local::LocalEmbeddingProvider;
pub use remote::RemoteEmbeddingProvider;
