// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the FedAurora CLI

pub mod config;
pub mod model;
pub mod round;

pub use self::config::ConfigCommand;
pub use self::model::ModelCommand;
pub use self::round::RoundCommand;
