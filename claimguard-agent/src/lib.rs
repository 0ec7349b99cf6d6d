//! claimguard-agent library interface
//!
//! Retrieval-augmented question answering over claim documents, plus the
//! command parsing used by the interactive shell.

pub mod llm_client;
pub mod rag;
pub mod repl;

pub use llm_client::{ChatModel, LlmError, OpenRouterClient};
pub use rag::{RagAgent, RagAnswer};
pub use repl::Command;
