//! HTTP upstream clients.

pub mod openai;

pub use openai::OpenAiClient;
