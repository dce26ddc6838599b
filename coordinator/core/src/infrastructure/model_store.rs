// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Global Model Stores
//
// In-memory store for development and tests; file store keeps the latest
// model as `averaged_model.json` so it survives a coordinator restart.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::model::GlobalModel;
use crate::domain::repository::{GlobalModelStore, RepositoryError};

pub const GLOBAL_MODEL_FILE: &str = "averaged_model.json";

#[derive(Default)]
pub struct InMemoryGlobalModelStore {
    latest: RwLock<Option<GlobalModel>>,
}

impl InMemoryGlobalModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GlobalModelStore for InMemoryGlobalModelStore {
    async fn save(&self, model: &GlobalModel) -> Result<(), RepositoryError> {
        *self.latest.write() = Some(model.clone());
        Ok(())
    }

    async fn load_latest(&self) -> Result<Option<GlobalModel>, RepositoryError> {
        Ok(self.latest.read().clone())
    }
}

pub struct FileGlobalModelStore {
    dir: PathBuf,
}

impl FileGlobalModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(GLOBAL_MODEL_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.tmp", GLOBAL_MODEL_FILE))
    }
}

#[async_trait]
impl GlobalModelStore for FileGlobalModelStore {
    async fn save(&self, model: &GlobalModel) -> Result<(), RepositoryError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let bytes = serde_json::to_vec_pretty(model)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        // atomic replace
        tokio::fs::rename(&temp, self.model_path()).await?;

        debug!(path = %self.model_path().display(), "Global model written");
        Ok(())
    }

    async fn load_latest(&self) -> Result<Option<GlobalModel>, RepositoryError> {
        let path = self.model_path();
        if !exists(&path).await {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parameters::ParameterTree;
    use crate::domain::round::RoundId;

    fn model(value: f64) -> GlobalModel {
        GlobalModel::new(RoundId::new(), ParameterTree::from(vec![value, value]), 2)
    }

    #[tokio::test]
    async fn test_in_memory_store_keeps_latest() {
        let store = InMemoryGlobalModelStore::new();
        assert!(store.load_latest().await.unwrap().is_none());

        store.save(&model(1.0)).await.unwrap();
        let second = model(2.0);
        store.save(&second).await.unwrap();

        assert_eq!(store.load_latest().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_file_store_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let saved = model(4.0);

        FileGlobalModelStore::new(dir.path().join("global_models"))
            .save(&saved)
            .await
            .unwrap();

        let reopened = FileGlobalModelStore::new(dir.path().join("global_models"));
        assert!(reopened.model_path().ends_with(GLOBAL_MODEL_FILE));
        assert_eq!(reopened.load_latest().await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_file_store_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGlobalModelStore::new(dir.path());
        assert!(store.load_latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGlobalModelStore::new(dir.path());
        std::fs::write(store.model_path(), b"{not json").unwrap();

        assert!(matches!(
            store.load_latest().await,
            Err(RepositoryError::Serialization(_))
        ));
    }
}
