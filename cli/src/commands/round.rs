// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Round operations against a running coordinator
//!
//! Commands: start, submit, reset, status, participants, report, watch

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use futures::StreamExt;

use fedaurora_core::domain::round::RoundState;
use fedaurora_sdk::{CoordinatorClient, ParameterTree, RoundEvent, RoundStatus, RoundUpdate};

#[derive(Subcommand)]
pub enum RoundCommand {
    /// Open a new round
    Start {
        /// Number of participants to wait for
        #[arg(value_name = "EXPECTED_COUNT", allow_negative_numbers = true)]
        expected_count: i64,
    },

    /// Submit a participant update
    Submit {
        /// Participant identifier
        #[arg(short, long)]
        participant: String,

        /// Base URL where the participant receives the global model
        #[arg(long)]
        callback: String,

        /// Parameters (JSON string or @file.json)
        #[arg(value_name = "PARAMETERS")]
        parameters: String,
    },

    /// Abandon the current round and return to IDLE
    Reset,

    /// Show round state and progress
    Status,

    /// List participants that submitted this round
    Participants,

    /// Show the delivery report of the last completed round
    Report,

    /// Follow round events as they happen
    Watch,
}

pub async fn handle_command(command: RoundCommand, url: &str) -> Result<()> {
    let client = CoordinatorClient::new(url);

    match command {
        RoundCommand::Start { expected_count } => {
            let started = client.start_round(expected_count).await?;
            println!(
                "{}",
                format!("✓ Round {} started", started.round_id).green()
            );
            println!("  Waiting for {} participants", started.expected);
        }
        RoundCommand::Submit {
            participant,
            callback,
            parameters,
        } => {
            let parameters = read_parameters(&parameters)?;
            let ack = client.submit(&participant, &callback, &parameters).await?;
            let verb = if ack.replaced { "replaced" } else { "accepted" };
            println!(
                "{}",
                format!("✓ Submission {} ({}/{})", verb, ack.received, ack.expected).green()
            );
        }
        RoundCommand::Reset => {
            client.reset().await?;
            println!("{}", "✓ Round reset".green());
        }
        RoundCommand::Status => print_status(&client.status().await?),
        RoundCommand::Participants => {
            let participants = client.participants().await?;
            if participants.participants.is_empty() {
                println!("{}", "No submissions yet".dimmed());
            }
            for id in participants.participants {
                println!("  {}", id);
            }
        }
        RoundCommand::Report => match client.delivery_report().await? {
            Some(report) => {
                println!("{}", format!("Round {}", report.round_id).bold());
                println!(
                    "  Delivered: {}/{}",
                    report.delivered.len(),
                    report.attempted
                );
                for failure in &report.failed {
                    println!(
                        "  {} {} ({}): {}",
                        "✗".red(),
                        failure.participant_id,
                        failure.address,
                        failure.reason
                    );
                }
            }
            None => println!("{}", "No round has completed yet".dimmed()),
        },
        RoundCommand::Watch => watch(&client).await?,
    }

    Ok(())
}

/// Accepts inline JSON or `@path` to a JSON file.
fn read_parameters(arg: &str) -> Result<ParameterTree> {
    let json = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameters from {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&json).context("Parameters must be numbers, arrays or objects of numbers")
}

fn print_status(status: &RoundStatus) {
    let state = match status.state {
        RoundState::Idle => status.state.to_string().dimmed(),
        RoundState::Collecting => status.state.to_string().yellow(),
        RoundState::Aggregating | RoundState::Distributing => status.state.to_string().cyan(),
        RoundState::Complete => status.state.to_string().green(),
    };
    println!("State: {}", state.bold());
    if let Some(round_id) = status.round_id {
        println!("Round: {}", round_id);
    }
    println!("Received: {}/{}", status.received, status.expected);
}

async fn watch(client: &CoordinatorClient) -> Result<()> {
    let mut updates = client.watch_events().await?;
    while let Some(update) = updates.next().await {
        match update? {
            RoundUpdate::Status(status) => print_status(&status),
            RoundUpdate::Event(event) => print_event(&event),
        }
    }
    Ok(())
}

fn print_event(event: &RoundEvent) {
    match event {
        RoundEvent::RoundStarted { round_id, expected, .. } => {
            println!("{} round {} expecting {}", "▶".cyan(), round_id, expected)
        }
        RoundEvent::Progress { received, expected, .. } => {
            println!("  {}/{} submissions", received, expected)
        }
        RoundEvent::ModelAggregated { participants, .. } => {
            println!("{} aggregated {} updates", "Σ".cyan(), participants)
        }
        RoundEvent::AggregationFailed { reason, .. } => {
            println!("{} aggregation failed: {}", "✗".red(), reason)
        }
        RoundEvent::DistributionFailed { participant_id, address, reason, .. } => {
            println!("{} {} ({}): {}", "✗".red(), participant_id, address, reason)
        }
        RoundEvent::Complete { delivered, failed, .. } => println!(
            "{} complete: {} delivered, {} failed",
            "✓".green(),
            delivered,
            failed
        ),
        RoundEvent::Reset { .. } => println!("{} reset", "↺".yellow()),
    }
}
