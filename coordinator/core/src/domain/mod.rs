// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer (`fedaurora-core`)
//!
//! Types and rules of federated round coordination. Apart from reading the
//! configuration manifest, nothing here performs I/O.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`parameters`] | `ParameterTree`, `Shape`, `ShapeMismatch` |
//! | [`round`] | `Round`, `RoundState`, `RoundError`, `QuorumBatch` |
//! | [`model`] | `GlobalModel` |
//! | [`events`] | `RoundEvent` |
//! | [`distribution`] | `ModelPush`, `DeliveryReport` |
//! | [`repository`] | `GlobalModelStore` |
//! | [`config`] | `CoordinatorConfig` |

pub mod config;
pub mod distribution;
pub mod events;
pub mod model;
pub mod parameters;
pub mod repository;
pub mod round;
