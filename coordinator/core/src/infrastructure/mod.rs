// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Infrastructure Layer (`fedaurora-core`)
//!
//! Adapters behind the domain ports.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`event_bus`] | Broadcast status channel for `RoundEvent`s |
//! | [`http_push`] | `ModelPush` over HTTP (reqwest) |
//! | [`model_store`] | In-memory and file-backed `GlobalModelStore`s |

pub mod event_bus;
pub mod http_push;
pub mod model_store;
