pub mod http;
pub mod local;

pub use http::{HttpLlmConfig, HttpLlmProvider};
pub use local::LocalLlmProvider;
