// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::parameters::ParameterTree;
use crate::domain::round::RoundId;

/// The consensus model produced by the most recent successful aggregation.
///
/// Overwritten each round; never cleared by a reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalModel {
    pub round_id: RoundId,
    pub parameters: ParameterTree,
    /// Number of submissions averaged into `parameters`.
    pub participants: usize,
    pub aggregated_at: DateTime<Utc>,
}

impl GlobalModel {
    pub fn new(round_id: RoundId, parameters: ParameterTree, participants: usize) -> Self {
        Self {
            round_id,
            parameters,
            participants,
            aggregated_at: Utc::now(),
        }
    }
}
