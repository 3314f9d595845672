//! UniLink chat server
//!
//! Entry point for the `unilink` binary: the campus chat HTTP API plus a
//! few maintenance commands.

mod commands;
mod http;
mod pipeline;
mod responder;

use clap::{Parser, Subcommand};
use commands::{AskCommand, PromptsCommand, SeedCommand, ServeCommand};
use std::path::PathBuf;
use unilink_core::logging::{self, LogFormat};
use unilink_core::{config::AppConfig, AppResult};

/// UniLink - campus chat assistant
#[derive(Parser, Debug)]
#[command(name = "unilink")]
#[command(about = "Campus chat assistant: classify, retrieve, answer", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "UNILINK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, global = true, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Generation provider (ollama, gemini)
    #[arg(short, long, global = true, env = "UNILINK_PROVIDER")]
    provider: Option<String>,

    /// Answer model identifier
    #[arg(short, long, global = true, env = "UNILINK_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the chat HTTP API
    Serve(ServeCommand),

    /// Ask one question from the terminal
    Ask(AskCommand),

    /// Load sample records into the document store
    Seed(SeedCommand),

    /// List the effective chat prompts
    Prompts(PromptsCommand),
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    LogFormat::parse(s).ok_or_else(|| format!("unknown log format '{}' (expected text or json)", s))
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config)?;

    let (host, port) = match &cli.command {
        Commands::Serve(cmd) => (cmd.host.clone(), cmd.port),
        _ => (None, None),
    };

    let config = config.with_overrides(
        cli.provider,
        cli.model,
        host,
        port,
        cli.log_level,
        cli.log_format,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.log_format, config.no_color)?;

    tracing::debug!("Config file: {:?}", config.config_file);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Serve(_) => "serve",
        Commands::Ask(_) => "ask",
        Commands::Seed(_) => "seed",
        Commands::Prompts(_) => "prompts",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Seeding and listing prompts never talk to a provider
    if matches!(cli.command, Commands::Serve(_) | Commands::Ask(_)) {
        config.validate()?;
    }

    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Seed(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
