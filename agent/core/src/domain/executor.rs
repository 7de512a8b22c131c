// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mount Executor Trait - Anti-Corruption Layer for the volume CLI
//!
//! Abstracts the external mount/unmount tool so the lifecycle manager can be
//! tested against a mock and so a future backend swap does not touch the
//! coordination logic. Implementations perform no registry mutation; they
//! only invoke the tool and interpret its result.

use crate::domain::mount::MountDescriptor;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("volume tool exited with status {status}: {diagnostic}")]
    ToolFailed { status: i32, diagnostic: String },

    #[error("volume tool did not finish within {timeout_secs}s")]
    TimedOut { timeout_secs: u64 },

    #[error("failed to invoke volume tool: {0}")]
    Invocation(String),
}

/// Synchronous mount/unmount against the external storage backend
///
/// Both calls block the serialized lifecycle context until the tool exits
/// or the configured timeout elapses; a timeout is a failure.
#[async_trait]
pub trait MountExecutor: Send + Sync {
    /// Mount the descriptor's volume; returns the deterministic host mount
    /// path on success
    async fn mount(&self, descriptor: &MountDescriptor) -> Result<PathBuf, ExecutorError>;

    /// Unmount the descriptor's volume
    async fn unmount(&self, descriptor: &MountDescriptor) -> Result<(), ExecutorError>;
}
