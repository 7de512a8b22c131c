// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume CLI Executor
//!
//! Invokes the external volume CLI (`dvdcli` in the reference deployment)
//! for mount and unmount. The tool is opaque: the executor passes sanitized
//! argument values, waits synchronously, and interprets the exit status.
//! Every invocation runs under the configured timeout; exceeding it is
//! reported the same way as a tool failure.

use crate::domain::config::IsolatorConfig;
use crate::domain::executor::{ExecutorError, MountExecutor};
use crate::domain::mount::MountDescriptor;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

pub struct DvdCliExecutor {
    cli_path: PathBuf,
    tool_timeout: Duration,
}

impl DvdCliExecutor {
    pub fn new(config: &IsolatorConfig) -> Self {
        Self {
            cli_path: config.cli_path.clone(),
            tool_timeout: config.tool_timeout,
        }
    }

    async fn run(&self, args: &[String]) -> Result<Output, ExecutorError> {
        debug!(tool = %self.cli_path.display(), ?args, "invoking volume tool");

        let mut command = Command::new(&self.cli_path);
        // Reap the child if the invocation outlives the timeout.
        command.args(args).kill_on_drop(true);

        match timeout(self.tool_timeout, command.output()).await {
            Err(_) => Err(ExecutorError::TimedOut {
                timeout_secs: self.tool_timeout.as_secs(),
            }),
            Ok(Err(e)) => Err(ExecutorError::Invocation(e.to_string())),
            Ok(Ok(output)) => Ok(output),
        }
    }

    fn diagnostic(output: &Output) -> String {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut diagnostic = stderr.trim().to_string();
        if diagnostic.is_empty() {
            diagnostic = stdout.trim().to_string();
        }
        diagnostic
    }
}

#[async_trait]
impl MountExecutor for DvdCliExecutor {
    async fn mount(&self, descriptor: &MountDescriptor) -> Result<PathBuf, ExecutorError> {
        let args = vec![
            "mount".to_string(),
            format!("--volumename={}", descriptor.volume_name),
            format!("--volumedriver={}", descriptor.volume_driver),
            format!("--volumeopts={}", descriptor.options),
        ];

        let output = self.run(&args).await?;
        if output.status.success() {
            // The backend places the mount at the well-known deterministic
            // path, not in the tool's output.
            Ok(descriptor.mount_point.clone())
        } else {
            Err(ExecutorError::ToolFailed {
                status: output.status.code().unwrap_or(-1),
                diagnostic: Self::diagnostic(&output),
            })
        }
    }

    async fn unmount(&self, descriptor: &MountDescriptor) -> Result<(), ExecutorError> {
        let args = vec![
            "unmount".to_string(),
            format!("--volumename={}", descriptor.volume_name),
        ];

        let output = self.run(&args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ExecutorError::ToolFailed {
                status: output.status.code().unwrap_or(-1),
                diagnostic: Self::diagnostic(&output),
            })
        }
    }
}

// ============================================================================
// Mock Executor (for tests)
// ============================================================================

/// Recorded external-tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorCall {
    Mount {
        volume_name: String,
        volume_driver: String,
        options: String,
    },
    Unmount {
        volume_name: String,
    },
}

/// In-memory executor that records its call log instead of spawning the tool
///
/// Tests use the log to observe which volumes are "mounted" on the host and
/// inject failures per volume name.
#[derive(Default)]
pub struct MockMountExecutor {
    calls: std::sync::Mutex<Vec<ExecutorCall>>,
    failing_volumes: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl MockMountExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every mount of the named volume fail with a non-zero exit
    pub fn fail_volume(&self, volume_name: impl Into<String>) {
        self.failing_volumes
            .lock()
            .unwrap()
            .insert(volume_name.into());
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mount_count(&self, volume_name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ExecutorCall::Mount { volume_name: n, .. } if n == volume_name))
            .count()
    }

    pub fn unmount_count(&self, volume_name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ExecutorCall::Unmount { volume_name: n } if n == volume_name))
            .count()
    }

    /// Volumes currently mounted according to the call log
    pub fn mounted_volumes(&self) -> Vec<String> {
        let mut mounted = Vec::new();
        for call in self.calls() {
            match call {
                ExecutorCall::Mount { volume_name, .. } => {
                    if !mounted.contains(&volume_name) {
                        mounted.push(volume_name);
                    }
                }
                ExecutorCall::Unmount { volume_name } => {
                    mounted.retain(|v| *v != volume_name);
                }
            }
        }
        mounted
    }
}

#[async_trait]
impl MountExecutor for MockMountExecutor {
    async fn mount(&self, descriptor: &MountDescriptor) -> Result<PathBuf, ExecutorError> {
        let failing = self
            .failing_volumes
            .lock()
            .unwrap()
            .contains(&descriptor.volume_name);
        if failing {
            return Err(ExecutorError::ToolFailed {
                status: 1,
                diagnostic: format!("no such volume: {}", descriptor.volume_name),
            });
        }

        self.calls.lock().unwrap().push(ExecutorCall::Mount {
            volume_name: descriptor.volume_name.clone(),
            volume_driver: descriptor.volume_driver.clone(),
            options: descriptor.options.clone(),
        });
        Ok(descriptor.mount_point.clone())
    }

    async fn unmount(&self, descriptor: &MountDescriptor) -> Result<(), ExecutorError> {
        self.calls.lock().unwrap().push(ExecutorCall::Unmount {
            volume_name: descriptor.volume_name.clone(),
        });
        Ok(())
    }
}
