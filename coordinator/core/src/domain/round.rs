// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Round Aggregate
//!
//! One [`Round`] is the single piece of live coordination state: it stages
//! participant submissions and walks the lifecycle
//!
//! ```text
//! IDLE ──start──▶ COLLECTING ──quorum──▶ AGGREGATING ──▶ DISTRIBUTING ──▶ COMPLETE
//!   ▲                                         │                               │
//!   └──────────── reset / aggregation failure ┴───────────── start ───────────┘
//! ```
//!
//! The aggregate itself is synchronous and lock-free; the application layer
//! owns it behind a single mutex so the COLLECTING → AGGREGATING transition
//! is observed by exactly one submitter.
//!
//! ## Stale work
//!
//! Every `start` and `reset` bumps a generation counter. Work scheduled for a
//! round carries a [`RoundTicket`]; once the generation moves on, the
//! ticket no longer matches and its results are discarded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::parameters::{ParameterTree, Shape, ShapeMismatch};

/// Unique identifier for a [`Round`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundId(pub Uuid);

impl RoundId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundState {
    Idle,
    Collecting,
    Aggregating,
    Distributing,
    Complete,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundState::Idle => "IDLE",
            RoundState::Collecting => "COLLECTING",
            RoundState::Aggregating => "AGGREGATING",
            RoundState::Distributing => "DISTRIBUTING",
            RoundState::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}

/// One participant's update for the current round.
#[derive(Debug, Clone)]
pub struct Submission {
    pub participant_id: String,
    pub callback_address: String,
    pub parameters: Arc<ParameterTree>,
    pub received_at: DateTime<Utc>,
}

/// Where the aggregated model has to be pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub participant_id: String,
    pub callback_address: String,
}

impl From<&Submission> for Recipient {
    fn from(submission: &Submission) -> Self {
        Self {
            participant_id: submission.participant_id.clone(),
            callback_address: submission.callback_address.clone(),
        }
    }
}

/// Identifies the round a unit of background work belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTicket {
    pub round_id: RoundId,
    pub generation: u64,
}

/// Everything the aggregation pipeline needs once quorum is reached.
#[derive(Debug, Clone)]
pub struct QuorumBatch {
    pub ticket: RoundTicket,
    pub submissions: Vec<Submission>,
}

impl QuorumBatch {
    pub fn recipients(&self) -> Vec<Recipient> {
        self.submissions.iter().map(Recipient::from).collect()
    }
}

/// Synchronous acknowledgment handed back to a submitter.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub round_id: RoundId,
    pub received: usize,
    pub expected: usize,
    /// The participant had already submitted this round.
    pub replaced: bool,
    /// Present for exactly one submitter per round: the one that closed collection.
    pub quorum: Option<QuorumBatch>,
}

/// Point-in-time view of the round for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStatus {
    pub state: RoundState,
    pub round_id: Option<RoundId>,
    pub received: usize,
    pub expected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error("expected participant count must be at least 1, got {0}")]
    InvalidExpectedCount(i64),

    #[error("a round is already in progress (state: {0})")]
    RoundInProgress(RoundState),

    #[error("round is not collecting submissions (state: {0}); retry in the next round")]
    RoundNotCollecting(RoundState),

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),
}

impl RoundError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            RoundError::InvalidExpectedCount(_) => "invalid_expected_count",
            RoundError::RoundInProgress(_) => "round_in_progress",
            RoundError::RoundNotCollecting(_) => "round_not_collecting",
            RoundError::InvalidSubmission(_) => "invalid_submission",
            RoundError::ShapeMismatch(_) => "shape_mismatch",
        }
    }
}

/// Aggregate root for the live coordination round.
///
/// # Invariants
///
/// - `submissions.len() <= expected_count` at all times.
/// - All staged submissions conform to `shape`, fixed by the first accepted one.
/// - Only one quorum batch is produced per generation.
#[derive(Debug)]
pub struct Round {
    id: Option<RoundId>,
    generation: u64,
    expected_count: usize,
    state: RoundState,
    shape: Option<Shape>,
    submissions: BTreeMap<String, Submission>,
}

impl Default for Round {
    fn default() -> Self {
        Self::new()
    }
}

impl Round {
    pub fn new() -> Self {
        Self {
            id: None,
            generation: 0,
            expected_count: 0,
            state: RoundState::Idle,
            shape: None,
            submissions: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn id(&self) -> Option<RoundId> {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn received(&self) -> usize {
        self.submissions.len()
    }

    pub fn expected(&self) -> usize {
        self.expected_count
    }

    pub fn status(&self) -> RoundStatus {
        RoundStatus {
            state: self.state,
            round_id: self.id,
            received: self.received(),
            expected: self.expected_count,
        }
    }

    pub fn participant_ids(&self) -> Vec<String> {
        self.submissions.keys().cloned().collect()
    }

    /// IDLE | COMPLETE → COLLECTING.
    pub fn start(&mut self, expected_count: i64) -> Result<RoundId, RoundError> {
        if !matches!(self.state, RoundState::Idle | RoundState::Complete) {
            return Err(RoundError::RoundInProgress(self.state));
        }
        let expected = usize::try_from(expected_count)
            .ok()
            .filter(|count| *count >= 1)
            .ok_or(RoundError::InvalidExpectedCount(expected_count))?;

        self.clear();
        let id = RoundId::new();
        self.id = Some(id);
        self.expected_count = expected;
        self.state = RoundState::Collecting;
        Ok(id)
    }

    /// Stage a submission. The call that brings `received` to `expected`
    /// moves the round to AGGREGATING and carries the [`QuorumBatch`].
    pub fn submit(
        &mut self,
        participant_id: &str,
        callback_address: &str,
        parameters: ParameterTree,
        received_at: DateTime<Utc>,
    ) -> Result<SubmitReceipt, RoundError> {
        if self.state != RoundState::Collecting {
            return Err(RoundError::RoundNotCollecting(self.state));
        }
        let round_id = self
            .id
            .ok_or(RoundError::RoundNotCollecting(self.state))?;

        if participant_id.trim().is_empty() {
            return Err(RoundError::InvalidSubmission(
                "participant_id must not be empty".to_string(),
            ));
        }
        if callback_address.trim().is_empty() {
            return Err(RoundError::InvalidSubmission(
                "callback_address must not be empty".to_string(),
            ));
        }

        match &self.shape {
            Some(shape) => parameters.conforms_to(shape)?,
            None => self.shape = Some(parameters.shape()),
        }

        let submission = Submission {
            participant_id: participant_id.to_string(),
            callback_address: callback_address.to_string(),
            parameters: Arc::new(parameters),
            received_at,
        };
        let replaced = self
            .submissions
            .insert(participant_id.to_string(), submission)
            .is_some();

        let received = self.submissions.len();
        let quorum = if received == self.expected_count {
            self.state = RoundState::Aggregating;
            Some(QuorumBatch {
                ticket: RoundTicket {
                    round_id,
                    generation: self.generation,
                },
                submissions: self.submissions.values().cloned().collect(),
            })
        } else {
            None
        };

        Ok(SubmitReceipt {
            round_id,
            received,
            expected: self.expected_count,
            replaced,
            quorum,
        })
    }

    /// Whether `ticket` still refers to the live round.
    pub fn is_current(&self, ticket: &RoundTicket) -> bool {
        self.generation == ticket.generation && self.id == Some(ticket.round_id)
    }

    /// AGGREGATING → DISTRIBUTING. Returns `false` for stale tickets.
    pub fn begin_distribution(&mut self, ticket: &RoundTicket) -> bool {
        if !self.is_current(ticket) || self.state != RoundState::Aggregating {
            return false;
        }
        self.state = RoundState::Distributing;
        true
    }

    /// DISTRIBUTING → COMPLETE. Returns `false` for stale tickets.
    pub fn complete(&mut self, ticket: &RoundTicket) -> bool {
        if !self.is_current(ticket) || self.state != RoundState::Distributing {
            return false;
        }
        self.state = RoundState::Complete;
        true
    }

    /// Abort the pipeline of the live round back to IDLE.
    pub fn abort(&mut self, ticket: &RoundTicket) -> bool {
        if !self.is_current(ticket)
            || !matches!(self.state, RoundState::Aggregating | RoundState::Distributing)
        {
            return false;
        }
        self.reset();
        true
    }

    /// Any state → IDLE. Invalidates all outstanding tickets.
    pub fn reset(&mut self) {
        self.clear();
        self.id = None;
        self.expected_count = 0;
        self.state = RoundState::Idle;
    }

    fn clear(&mut self) {
        self.generation += 1;
        self.shape = None;
        self.submissions.clear();
    }
}
