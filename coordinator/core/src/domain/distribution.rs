// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Distribution Contracts
//!
//! [`ModelPush`] is the outbound port used to hand the aggregated model back to
//! a participant. The HTTP adapter lives in
//! `crate::infrastructure::http_push`; tests substitute in-process doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::model::GlobalModel;
use crate::domain::round::RoundId;

/// Delivers a global model to one participant endpoint.
#[async_trait]
pub trait ModelPush: Send + Sync {
    async fn push(&self, address: &str, model: &GlobalModel) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("network error: {0}")]
    Network(String),

    #[error("endpoint responded with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid callback address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistributionError {
    #[error("no recipients registered for distribution")]
    NoRecipients,
}

/// A single participant the model could not be delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub participant_id: String,
    pub address: String,
    pub reason: String,
}

/// Outcome of one distribution pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub round_id: RoundId,
    pub attempted: usize,
    /// Participant ids that acknowledged the model.
    pub delivered: Vec<String>,
    pub failed: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn failed_addresses(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.address.as_str()).collect()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}
