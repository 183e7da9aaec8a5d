//! Language-model provider abstraction for eurodata
//!
//! The query engine works without a model. When one is configured it is used
//! for two narrow jobs: classifying a free-text question into a closed set of
//! catalog keys, and writing short trend summaries. This crate provides:
//!
//! - Message and completion request/response types
//! - The [`LLMProvider`] trait that callers accept as an injected handle
//! - An OpenAI-compatible chat-completions provider (behind the `openai` feature)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(feature = "openai")]
pub mod providers;
