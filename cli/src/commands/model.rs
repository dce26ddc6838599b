// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Global model commands
//!
//! Commands: show

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use fedaurora_sdk::CoordinatorClient;

#[derive(Subcommand)]
pub enum ModelCommand {
    /// Show the latest global model
    Show {
        /// Write the averaged parameters to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

pub async fn handle_command(command: ModelCommand, url: &str) -> Result<()> {
    let client = CoordinatorClient::new(url);

    match command {
        ModelCommand::Show { output } => {
            let Some(model) = client.global_model().await? else {
                println!("{}", "No global model has been aggregated yet".dimmed());
                return Ok(());
            };

            eprintln!(
                "{}",
                format!(
                    "Round {} · {} participants · {}",
                    model.round_id, model.participants, model.aggregated_at
                )
                .bold()
            );

            let json = serde_json::to_string_pretty(&model.parameters)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write model to {:?}", path))?;
                    println!(
                        "{}",
                        format!("✓ Global model written to {}", path.display()).green()
                    );
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}
