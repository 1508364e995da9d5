pub mod client;
pub mod error;
pub mod media;
pub mod openai;

pub use openai::OpenAiClient;
