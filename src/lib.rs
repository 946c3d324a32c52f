//! StickLLM - terminal chat client library
//!
//! This library provides the core of the StickLLM chat client: persisted
//! sessions, prompt assembly, the llama.cpp completion client and the
//! interactive chat state machine.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `storage`: SQLite-backed sessions and messages
//! - `prompts`: Plain-text prompt assembly
//! - `providers`: Completion server abstraction and the llama.cpp client
//! - `controller`: Interactive chat state machine
//! - `context`: Process-lifetime context file list
//! - `commands`: CLI command handlers and the special command parser
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use stickllm::{Config, LlamaCppProvider, SqliteStorage};
//! use stickllm::controller::{ChatController, ScriptedInput};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let storage = SqliteStorage::from_config(&config.storage)?;
//!     let provider = LlamaCppProvider::new(&config.server, &config.generation)?;
//!
//!     let mut chat = ChatController::new(&storage, &provider, config.persona(), std::io::stdout());
//!     chat.start(None, Some("Scratch"))?;
//!     chat.run(&mut ScriptedInput::from_lines(["Hello!"])).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod prompts;
pub mod providers;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use controller::{ChatController, ChatState};
pub use error::{Result, StickllmError};
pub use providers::{CompletionProvider, LlamaCppProvider, Message, Role};
pub use storage::SqliteStorage;

#[cfg(test)]
pub mod test_utils;
