// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Snapshot Store Trait
//!
//! Persistence contract for the claim registry, defined in the domain layer
//! and implemented in `crate::infrastructure::snapshot`. The registry is
//! saved after every successful claims mutation and read once at manager
//! start-up to support crash recovery.

use crate::domain::claims::ClaimRegistry;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(String),

    #[error("snapshot serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Durably record the registry; must be atomic with respect to a crash
    /// (a partially written snapshot is never observable as valid)
    async fn save(&self, registry: &ClaimRegistry) -> Result<(), SnapshotError>;

    /// Read the last saved registry; `None` when no snapshot exists yet
    async fn load(&self) -> Result<Option<ClaimRegistry>, SnapshotError>;
}
