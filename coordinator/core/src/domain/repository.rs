// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Global Model Repository
//!
//! Persistence contract for the latest [`GlobalModel`]. The interface lives in
//! the domain layer and is implemented in `crate::infrastructure::model_store`.
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | `InMemoryGlobalModelStore` | process memory (default) |
//! | `FileGlobalModelStore` | `<dir>/averaged_model.json` |
//!
//! The backend is selected at startup from `spec.storage` in the coordinator
//! configuration.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::model::GlobalModel;

#[async_trait]
pub trait GlobalModelStore: Send + Sync {
    /// Replace the stored model.
    async fn save(&self, model: &GlobalModel) -> Result<(), RepositoryError>;

    /// Most recently saved model, if any.
    async fn load_latest(&self) -> Result<Option<GlobalModel>, RepositoryError>;
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
