// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use fedaurora_core::domain::config::CoordinatorConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./fedaurora-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output } => generate(output),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = CoordinatorConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. FEDAURORA_CONFIG_PATH: {}",
            std::env::var("FEDAURORA_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./fedaurora-config.yaml");
        println!("  4. ~/.fedaurora/config.yaml");
        println!("  5. /etc/fedaurora/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Coordinator:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Listen: {}", config.listen_address());
    println!("  Auto-reset on complete: {}", spec.round.auto_reset_on_complete);
    println!();

    println!("{}", "Distribution:".bold());
    println!("  Receive path: {}", spec.distribution.receive_path);
    println!("  Timeout: {}ms", spec.distribution.timeout_ms);
    println!();

    println!("{}", "Storage:".bold());
    match &spec.storage.global_model_dir {
        Some(dir) => println!("  Global model dir: {}", dir.display()),
        None => println!("  Global model dir: {}", "(in-memory)".dimmed()),
    }
    println!();

    println!("{}", "Observability:".bold());
    println!(
        "  Logging: {} ({:?})",
        spec.observability.logging.level, spec.observability.logging.format
    );
    if spec.observability.metrics.enabled {
        println!("  Metrics: enabled on port {}", spec.observability.metrics.port);
    } else {
        println!("  Metrics: {}", "disabled".dimmed());
    }
    println!("  Event buffer: {}", spec.events.capacity);

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = CoordinatorConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf) -> Result<()> {
    CoordinatorConfig::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fedaurora-config.yaml");

        generate(path.clone()).unwrap();
        validate(Some(path)).unwrap();
    }

    #[test]
    fn test_validate_rejects_wrong_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(
            &path,
            "apiVersion: fedaurora.ai/v1\nkind: NodeConfig\nmetadata:\n  name: x\nspec: {}\n",
        )
        .unwrap();

        assert!(validate(Some(path)).is_err());
    }
}
