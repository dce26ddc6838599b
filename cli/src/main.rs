// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # FedAurora CLI
//!
//! The `fedaurora` binary runs the round coordinator and drives it.
//!
//! ## Commands
//!
//! - `fedaurora serve` - Run the coordinator HTTP server in the foreground
//! - `fedaurora round start|submit|reset|status|participants|report|watch` - Round operations
//! - `fedaurora model show` - Fetch the latest global model
//! - `fedaurora config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use fedaurora_cli::commands::{self, ConfigCommand, ModelCommand, RoundCommand};
use fedaurora_cli::server;
use fedaurora_core::domain::config::{CoordinatorConfig, LogFormat};

/// FedAurora - synchronous federated averaging coordinator
#[derive(Parser)]
#[command(name = "fedaurora")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "FEDAURORA_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Coordinator URL used by client commands
    #[arg(
        long,
        global = true,
        env = "FEDAURORA_URL",
        default_value = "http://127.0.0.1:5000"
    )]
    url: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true, env = "FEDAURORA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator server
    #[command(name = "serve")]
    Serve {
        /// HTTP API port (overrides config)
        #[arg(long, env = "FEDAURORA_PORT")]
        port: Option<u16>,
    },

    /// Round operations
    #[command(name = "round")]
    Round {
        #[command(subcommand)]
        command: RoundCommand,
    },

    /// Global model operations
    #[command(name = "model")]
    Model {
        #[command(subcommand)]
        command: ModelCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            let mut config = CoordinatorConfig::load_or_default(cli.config)
                .context("Failed to load configuration")?;
            if let Some(port) = port {
                config.spec.server.port = port;
            }

            let logging = &config.spec.observability.logging;
            init_logging(
                cli.log_level.as_deref().unwrap_or(&logging.level),
                cli.log_format.unwrap_or(logging.format),
            )?;

            server::serve(config).await
        }
        Some(Commands::Round { command }) => {
            init_client_logging(&cli.log_level, cli.log_format)?;
            commands::round::handle_command(command, &cli.url).await
        }
        Some(Commands::Model { command }) => {
            init_client_logging(&cli.log_level, cli.log_format)?;
            commands::model::handle_command(command, &cli.url).await
        }
        Some(Commands::Config { command }) => {
            init_client_logging(&cli.log_level, cli.log_format)?;
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

fn init_client_logging(level: &Option<String>, format: Option<LogFormat>) -> Result<()> {
    init_logging(
        level.as_deref().unwrap_or("warn"),
        format.unwrap_or_default(),
    )
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    match value.to_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format '{}', expected text or json", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_round_submit() {
        let cli = Cli::try_parse_from([
            "fedaurora",
            "--url",
            "http://coordinator:5000",
            "round",
            "submit",
            "--participant",
            "edge-1",
            "--callback",
            "http://edge-1:8000",
            "@update.json",
        ])
        .unwrap();

        assert_eq!(cli.url, "http://coordinator:5000");
        assert!(matches!(
            cli.command,
            Some(Commands::Round {
                command: RoundCommand::Submit { .. }
            })
        ));
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!(parse_log_format("JSON"), Ok(LogFormat::Json));
        assert!(parse_log_format("xml").is_err());
    }
}
