// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::round::RoundId;

/// Round progress notifications published on the status channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    RoundStarted {
        round_id: RoundId,
        expected: usize,
        started_at: DateTime<Utc>,
    },
    Progress {
        round_id: RoundId,
        received: usize,
        expected: usize,
    },
    ModelAggregated {
        round_id: RoundId,
        participants: usize,
        aggregated_at: DateTime<Utc>,
    },
    AggregationFailed {
        round_id: RoundId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    DistributionFailed {
        round_id: RoundId,
        participant_id: String,
        address: String,
        reason: String,
    },
    Complete {
        round_id: RoundId,
        delivered: usize,
        failed: usize,
        completed_at: DateTime<Utc>,
    },
    Reset {
        reset_at: DateTime<Utc>,
    },
}

impl RoundEvent {
    /// Event name used as the SSE `event:` field.
    pub fn kind(&self) -> &'static str {
        match self {
            RoundEvent::RoundStarted { .. } => "round_started",
            RoundEvent::Progress { .. } => "progress",
            RoundEvent::ModelAggregated { .. } => "model_aggregated",
            RoundEvent::AggregationFailed { .. } => "aggregation_failed",
            RoundEvent::DistributionFailed { .. } => "distribution_failed",
            RoundEvent::Complete { .. } => "complete",
            RoundEvent::Reset { .. } => "reset",
        }
    }
}
