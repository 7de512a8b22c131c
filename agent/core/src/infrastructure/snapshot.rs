// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! File Snapshot Store
//!
//! Persists the claim registry as JSON under the agent's working directory.
//! Writes go to a temporary sibling path followed by a rename, so a crash
//! mid-write leaves either the previous snapshot or no snapshot, never a
//! truncated file that parses as valid state.

use crate::domain::claims::ClaimRegistry;
use crate::domain::config::IsolatorConfig;
use crate::domain::snapshot::{SnapshotError, SnapshotStore};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(config: &IsolatorConfig) -> Self {
        Self {
            path: config.snapshot_path(),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, registry: &ClaimRegistry) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SnapshotError::Io(format!(
                    "failed to create snapshot directory {}: {}",
                    parent.display(),
                    e
                )))?;
        }

        let bytes = serde_json::to_vec_pretty(registry)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await.map_err(|e| {
            SnapshotError::Io(format!("failed to write {}: {}", temp.display(), e))
        })?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            SnapshotError::Io(format!(
                "failed to move snapshot into place at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(path = %self.path.display(), containers = registry.len(), "claim snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<ClaimRegistry>, SnapshotError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SnapshotError::Io(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let registry = serde_json::from_slice(&bytes)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        Ok(Some(registry))
    }
}
