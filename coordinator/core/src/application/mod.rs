// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod aggregator;
pub mod coordinator;
pub mod distributor;

pub use aggregator::{aggregate, AggregationError};
pub use coordinator::{CoordinatorSettings, RoundCoordinator, SubmissionRequest};
pub use distributor::Distributor;
