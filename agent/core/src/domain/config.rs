// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Isolator configuration
//!
//! Every path and tool name the manager uses is carried in an explicit
//! configuration value passed at construction; there is no process-wide
//! mutable state. Loaded from the agent host's config file with serde,
//! with defaults matching the reference deployment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_work_dir() -> PathBuf {
    PathBuf::from("/tmp/mesos")
}

fn default_mount_prefix() -> PathBuf {
    PathBuf::from("/var/lib/rexray/volumes")
}

fn default_cli_path() -> PathBuf {
    PathBuf::from("/usr/bin/dvdcli")
}

fn default_driver() -> String {
    "rexray".to_string()
}

fn default_snapshot_file() -> String {
    "libstoragemounts.json".to_string()
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolatorConfig {
    /// Agent working directory holding the claim snapshot
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Prefix under which the storage backend places volume mounts; the
    /// host path for a volume is always `<mount_prefix>/<volume_name>`
    #[serde(default = "default_mount_prefix")]
    pub mount_prefix: PathBuf,

    /// The external volume CLI invoked for mount/unmount
    #[serde(default = "default_cli_path")]
    pub cli_path: PathBuf,

    /// Driver used when a container does not name one
    #[serde(default = "default_driver")]
    pub default_driver: String,

    /// Snapshot file name, resolved relative to `work_dir`
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    /// Upper bound on one external tool invocation; a timeout is treated
    /// as a tool failure
    #[serde(default = "default_tool_timeout", with = "humantime_serde")]
    pub tool_timeout: Duration,
}

impl IsolatorConfig {
    pub fn snapshot_path(&self) -> PathBuf {
        self.work_dir.join(&self.snapshot_file)
    }

    pub fn mount_point_for(&self, volume_name: &str) -> PathBuf {
        self.mount_prefix.join(volume_name)
    }
}

impl Default for IsolatorConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            mount_prefix: default_mount_prefix(),
            cli_path: default_cli_path(),
            default_driver: default_driver(),
            snapshot_file: default_snapshot_file(),
            tool_timeout: default_tool_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = IsolatorConfig::default();
        assert_eq!(config.work_dir, PathBuf::from("/tmp/mesos"));
        assert_eq!(config.default_driver, "rexray");
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/tmp/mesos/libstoragemounts.json")
        );
        assert_eq!(
            config.mount_point_for("db1"),
            PathBuf::from("/var/lib/rexray/volumes/db1")
        );
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: IsolatorConfig =
            serde_json::from_str(r#"{"work_dir": "/var/lib/agent"}"#).unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/var/lib/agent"));
        assert_eq!(config.cli_path, PathBuf::from("/usr/bin/dvdcli"));
        assert_eq!(config.tool_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_timeout_uses_humantime_format() {
        let config: IsolatorConfig =
            serde_json::from_str(r#"{"tool_timeout": "30s"}"#).unwrap();
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
    }
}
