// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! FedAurora Core
//!
//! Central coordinator for synchronous federated-averaging rounds: collects
//! one parameter update per participant, averages them once quorum is
//! reached, and pushes the global model back to every participant.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Round coordination, aggregation and distribution

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
