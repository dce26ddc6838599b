// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Wire types for the coordinator HTTP API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fedaurora_core::domain::distribution::DeliveryReport;
pub use fedaurora_core::domain::events::RoundEvent;
pub use fedaurora_core::domain::model::GlobalModel;
pub use fedaurora_core::domain::parameters::ParameterTree;
pub use fedaurora_core::domain::round::{RoundId, RoundState, RoundStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedRound {
    pub round_id: RoundId,
    pub expected: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAck {
    pub accepted: bool,
    pub round_id: RoundId,
    pub received: usize,
    pub expected: usize,
    #[serde(default)]
    pub replaced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participants {
    pub round_id: Option<RoundId>,
    pub participants: Vec<String>,
}

/// One item of the `/round/events` stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundUpdate {
    /// Snapshot sent once when the stream opens.
    Status(RoundStatus),
    Event(RoundEvent),
}

/// Non-2xx answer from the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("coordinator returned {status} ({code}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: String,
    pub message: String,
}
