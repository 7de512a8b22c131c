// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Value Objects
// ============================================================================

/// Opaque container identifier assigned by the agent host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derived key grouping claims that refer to the same external volume
///
/// Two descriptors with equal identity must never be mounted twice
/// concurrently. Case differences in driver or volume name do not produce
/// distinct identities. The hash is recomputed on demand and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountIdentity(u64);

/// One container's claim on one external volume
///
/// Immutable once constructed. The mount point is the deterministic host
/// path where the storage backend places the volume; `container_path` is
/// where the mount is bind-exposed inside the container namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountDescriptor {
    /// Owning container
    pub container_id: ContainerId,

    /// Name of the external storage backend driver (e.g. "rexray")
    pub volume_driver: String,

    /// Logical volume name, scoped to the backend (not globally unique)
    pub volume_name: String,

    /// Host filesystem path where the backend places the mount
    pub mount_point: PathBuf,

    /// Opaque driver-specific option string; empty means no options
    pub options: String,

    /// Path inside the container namespace where the mount is exposed
    pub container_path: PathBuf,
}

impl MountDescriptor {
    /// Construct a validated descriptor
    ///
    /// All fields except `options` must be non-empty. Charset validation of
    /// driver and name happens earlier, in the environment sanitizer, before
    /// a descriptor is ever built.
    pub fn new(
        container_id: ContainerId,
        volume_driver: impl Into<String>,
        volume_name: impl Into<String>,
        mount_point: PathBuf,
        options: impl Into<String>,
        container_path: PathBuf,
    ) -> Result<Self, MountError> {
        let volume_driver = volume_driver.into();
        let volume_name = volume_name.into();

        if container_id.as_str().is_empty() {
            return Err(MountError::EmptyField("container id"));
        }
        if volume_driver.is_empty() {
            return Err(MountError::EmptyField("volume driver"));
        }
        if volume_name.is_empty() {
            return Err(MountError::EmptyField("volume name"));
        }
        if mount_point.as_os_str().is_empty() {
            return Err(MountError::EmptyField("mount point"));
        }
        if container_path.as_os_str().is_empty() {
            return Err(MountError::EmptyField("container path"));
        }

        Ok(Self {
            container_id,
            volume_driver,
            volume_name,
            mount_point,
            options: options.into(),
            container_path,
        })
    }

    /// Derive the case-insensitive identity of the underlying external mount
    pub fn identity(&self) -> MountIdentity {
        let mut hasher = DefaultHasher::new();
        self.volume_driver.to_lowercase().hash(&mut hasher);
        self.volume_name.to_lowercase().hash(&mut hasher);
        MountIdentity(hasher.finish())
    }
}

/// One host-path to container-path volume binding handed to the containerizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub volume_name: String,
    pub host_path: PathBuf,
    pub container_path: PathBuf,
}

/// Launch information returned from a successful prepare
///
/// Lists the volume bindings the containerizer must expose inside the
/// container. Absent entirely when the container requested no volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLaunchInfo {
    pub volumes: Vec<VolumeBinding>,
}

impl ContainerLaunchInfo {
    pub fn from_descriptors(descriptors: &[MountDescriptor]) -> Self {
        Self {
            volumes: descriptors
                .iter()
                .map(|d| VolumeBinding {
                    volume_name: d.volume_name.clone(),
                    host_path: d.mount_point.clone(),
                    container_path: d.container_path.clone(),
                })
                .collect(),
        }
    }
}

// ============================================================================
// Domain Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum MountError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

// ============================================================================
// Tests
// ============================================================================
