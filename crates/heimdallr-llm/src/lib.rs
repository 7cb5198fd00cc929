//! Heimdallr LLM: chat-completions backed task executor
//!
//! Implements [`heimdallr_core::TaskExecutor`] against any OpenAI-compatible
//! `/chat/completions` endpoint. Each step's instruction, parameters and
//! output schema from the [`heimdallr_core::WorkflowCatalog`] are rendered
//! into a system/user message pair; the completion text comes back as
//! [`heimdallr_core::TaskOutput::Raw`] for the core to normalise.
//!
//! [`DataSourceExecutor`] sits in front of the chat executor and answers the
//! ticket lookup from Jira and the log search from the search-jobs API when
//! those are configured.

pub mod client;
pub mod config;
pub mod error;
pub mod jira;
pub mod log_search;
pub mod prompt;
pub mod sources;

pub use client::OpenAiExecutor;
pub use config::LlmConfig;
pub use error::LlmError;
pub use jira::{JiraClient, JiraConfig};
pub use log_search::{LogSearchClient, LogSearchConfig, SearchJob};
pub use prompt::{render, RenderedPrompt};
pub use sources::DataSourceExecutor;

/// Result type for heimdallr-llm operations
pub type Result<T> = std::result::Result<T, LlmError>;
