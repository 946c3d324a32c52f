//! StickLLM - terminal chat client for a local llama.cpp server
//!
#![doc = "StickLLM - terminal chat client"]
#![doc = "Main entry point for the StickLLM command-line tool."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stickllm::cli::{Cli, Commands};
use stickllm::commands;
use stickllm::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("cli/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command_or_default() {
        Commands::Chat { session, name } => {
            if let Some(id) = session {
                tracing::debug!("Resuming session: {}", id);
            }
            commands::chat::run_chat(config, session, name).await
        }
        Commands::Ask { text } => commands::ask::run_ask(config, text).await,
        Commands::Sessions => commands::sessions::list_sessions(&config),
        Commands::Context { command } => commands::context::handle_context(command),
    }
}

/// Log to stderr so stdout carries only chat output
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "stickllm=debug" } else { "stickllm=warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
