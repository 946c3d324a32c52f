//! Command-line interface definition for StickLLM
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chat, one-shot questions, session listing and
//! context management.

use clap::{Parser, Subcommand};

/// StickLLM - Portable AI Assistant
///
/// Terminal interface for a locally running completion server.
#[derive(Parser, Debug, Clone)]
#[command(name = "stickllm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cli/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the session database location
    #[arg(long, env = "STICKLLM_HISTORY_DB")]
    pub storage_path: Option<String>,

    /// Override the completion server URL
    #[arg(long)]
    pub server_url: Option<String>,

    /// Command to execute (defaults to `chat`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands for StickLLM
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Session ID to resume
        #[arg(long)]
        session: Option<i64>,

        /// Name for a new session
        #[arg(long)]
        name: Option<String>,
    },

    /// Ask a single question without persisting it
    Ask {
        /// Question text
        text: Vec<String>,
    },

    /// List chat sessions
    Sessions,

    /// Show or modify the context file list
    Context {
        /// Context subcommand
        #[command(subcommand)]
        command: Option<ContextCommand>,
    },
}

/// Context management subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ContextCommand {
    /// Add a file to the context
    Add {
        /// Path of the file to add
        path: Vec<String>,
    },

    /// Clear all context files
    Clear,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The command to run, `chat` when none was given
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Chat {
            session: None,
            name: None,
        })
    }
}
