// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`fedaurora-core`)
//!
//! HTTP surface that translates participant and operator requests into
//! [`RoundCoordinator`](crate::application::RoundCoordinator) calls.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP/SSE (Axum) | Round control, submissions, status stream |

pub mod api;
