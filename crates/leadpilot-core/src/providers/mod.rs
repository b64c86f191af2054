//! LLM provider abstraction used for personalization and follow-up analysis
//!
//! Providers implement the [`LlmProvider`] trait; the only concrete backend
//! is the OpenAI chat completions API (or anything speaking its wire format).

pub mod openai;
pub mod types;

pub use openai::OpenAiProvider;
pub use types::{CompletionRequest, LlmProvider};
