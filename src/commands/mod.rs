/*!
Command handlers for the CLI

This module provides the handlers invoked by the CLI entrypoint:

- `chat`     - Interactive chat backed by a stored session
- `ask`      - One-shot question, nothing persisted
- `sessions` - Table of stored sessions
- `context`  - Context list operations outside the REPL
*/

use crate::config::Config;
use crate::error::Result;
use crate::providers::{CompletionProvider, LlamaCppProvider};
use colored::Colorize;
use std::time::Duration;

// Special commands parser for the interactive loop
pub mod special_commands;

/// Probe the server with the configured retry policy
///
/// Prints the start-up hint when the server never answers.
async fn ensure_server<P: CompletionProvider + ?Sized>(provider: &P, config: &Config) -> bool {
    let wait = Duration::from_secs(config.server.health_wait_seconds);
    let report = provider
        .probe_health(config.server.health_retries, wait)
        .await;
    tracing::debug!(
        attempts = report.attempts,
        waits = report.waits,
        healthy = report.healthy,
        "Health check finished"
    );

    if !report.healthy {
        println!("{}", "Error: llama.cpp server is not running!".red());
        println!(
            "Please start the server first using: {}",
            "./launch.sh".cyan()
        );
    }
    report.healthy
}

// Chat command handler
pub mod chat {
    //! Interactive chat handler.
    //!
    //! Checks the server, resolves the session and hands a readline editor
    //! to the [`ChatController`](crate::controller::ChatController).

    use super::*;
    use crate::controller::ChatController;
    use crate::error::StickllmError;
    use crate::storage::SqliteStorage;
    use rustyline::DefaultEditor;

    /// Start interactive chat
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration
    /// * `session` - Id of a stored session to resume
    /// * `name` - Name for a newly created session
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be initialized or the terminal is
    /// unavailable. A missing session is reported and is not an error.
    pub async fn run_chat(config: Config, session: Option<i64>, name: Option<String>) -> Result<()> {
        tracing::info!("Starting interactive chat");

        let storage = SqliteStorage::from_config(&config.storage)?;
        let provider = LlamaCppProvider::new(&config.server, &config.generation)?;

        if !ensure_server(&provider, &config).await {
            return Ok(());
        }

        let mut controller =
            ChatController::new(&storage, &provider, config.persona(), std::io::stdout());

        if let Err(e) = controller.start(session, name.as_deref()) {
            if StickllmError::is_not_found(&e) {
                println!("{}", e.to_string().red());
                return Ok(());
            }
            return Err(e);
        }

        let mut rl = DefaultEditor::new()?;
        controller.run(&mut rl).await
    }
}

// One-shot question handler
pub mod ask {
    //! Single question mode.

    use super::*;
    use crate::prompts::build_prompt;
    use crate::providers::{self, Message};

    /// Answer one question without touching storage
    ///
    /// Exits the process with status 1 when `text` is empty.
    pub async fn run_ask(config: Config, text: Vec<String>) -> Result<()> {
        if text.is_empty() {
            println!("{}", "Error: Please provide a question".red());
            println!("Usage: stickllm ask \"your question here\"");
            std::process::exit(1);
        }

        let provider = LlamaCppProvider::new(&config.server, &config.generation)?;
        if !ensure_server(&provider, &config).await {
            return Ok(());
        }

        let question = text.join(" ");
        let no_context: [&str; 0] = [];
        let prompt = build_prompt(config.persona(), &no_context, &[Message::user(question)]);

        print!("{} ", "Assistant:".green());
        let mut out = std::io::stdout();
        let _ = providers::complete(&provider, &prompt, true, &mut out).await;
        println!();
        Ok(())
    }
}

// Session listing handler
pub mod sessions {
    //! Stored session listing.

    use super::*;
    use crate::storage::SqliteStorage;
    use chrono::Local;
    use prettytable::{format, Table};

    /// Print every stored session, most recently updated first
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    pub fn list_sessions(config: &Config) -> Result<()> {
        let storage = SqliteStorage::from_config(&config.storage)?;
        let sessions = storage.list_sessions()?;

        if sessions.is_empty() {
            println!("{}", "No sessions found".yellow());
            return Ok(());
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

        table.add_row(prettytable::row![
            "ID".bold(),
            "Name".bold(),
            "Messages".bold(),
            "Created".bold(),
            "Updated".bold()
        ]);

        for session in sessions {
            let name = if session.name.chars().count() > 40 {
                format!("{}...", session.name.chars().take(37).collect::<String>())
            } else {
                session.name
            };
            let created = session
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string();
            let updated = session
                .updated_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string();

            table.add_row(prettytable::row![
                session.id.to_string().cyan(),
                name,
                session.message_count,
                created,
                updated
            ]);
        }

        println!("\n{}", "Chat Sessions:".bold());
        table.printstd();
        println!();
        println!(
            "Use {} to resume a session.",
            "stickllm chat --session <ID>".cyan()
        );
        println!();
        Ok(())
    }
}

// Context list handler
pub mod context {
    //! Context list operations from the command line.
    //!
    //! The list lives only as long as the process, so these mirror the
    //! `/context` chat commands for a single invocation.

    use super::*;
    use crate::cli::ContextCommand;
    use crate::context::ContextFiles;

    /// Apply one context operation and print the result
    pub fn handle_context(command: Option<ContextCommand>) -> Result<()> {
        let mut files = ContextFiles::new();
        match command {
            Some(ContextCommand::Add { path }) => {
                let path = path.join(" ");
                match files.add(&path) {
                    Ok(added) => println!("{}", format!("Added to context: {}", added).green()),
                    Err(e) => println!("{}", e.to_string().red()),
                }
            }
            Some(ContextCommand::Clear) => {
                files.clear();
                println!("{}", "Context cleared".green());
            }
            None => print_context(&files),
        }
        Ok(())
    }

    fn print_context(files: &ContextFiles) {
        if files.is_empty() {
            println!("{}", "No context files loaded".yellow());
            return;
        }
        println!("{}", "Context files:".cyan());
        for (i, path) in files.files().iter().enumerate() {
            println!("  {}. {}", i + 1, path);
        }
    }
}
