// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
/// FedAurora Rust SDK
///
/// Drive federated-averaging rounds and submit participant updates.

pub mod client;
pub mod types;

pub use client::CoordinatorClient;
pub use types::*;
