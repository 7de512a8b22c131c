// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Isolator Application Service
//!
//! Orchestrates the mount lifecycle around the agent host's container
//! callbacks, coordinating:
//! - Domain layer: MountDescriptor, ClaimRegistry, EnvSanitizer
//! - Infrastructure layer: MountExecutor (external CLI), SnapshotStore
//! - Event bus: publishing MountEvents for observability
//!
//! Prepare is all-or-nothing: a container ends up with every requested
//! volume mounted and claimed, or with none of them. The host's external
//! mount state always matches `holder_count > 0` for every identity.
//!
//! All registry read-modify-write sequences, including the external tool
//! invocations they decide on, run under one mutex. That explicit scope is
//! the mutual-exclusion mechanism the correctness argument relies on; a
//! slow tool therefore blocks sibling containers' prepare/cleanup, bounded
//! by the executor timeout.

use crate::domain::claims::ClaimRegistry;
use crate::domain::config::IsolatorConfig;
use crate::domain::env_sanitizer::EnvSanitizer;
use crate::domain::events::MountEvent;
use crate::domain::executor::MountExecutor;
use crate::domain::mount::{ContainerId, ContainerLaunchInfo, MountDescriptor, MountIdentity};
use crate::domain::snapshot::SnapshotStore;
use crate::infrastructure::event_bus::EventBus;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

// ============================================================================
// Service Trait
// ============================================================================

/// Resource limits delivered with an `update` callback; the isolator
/// enforces none of them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu_millis: Option<u32>,
    pub memory_bytes: Option<u64>,
    pub disk_bytes: Option<u64>,
}

/// Usage statistics returned from the `usage` callback; always neutral
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub memory_bytes: Option<u64>,
    pub cpu_seconds: Option<f64>,
}

/// Lifecycle callbacks consumed from the hosting agent
///
/// All mount work happens in `prepare` and `cleanup`; the remaining
/// callbacks return immediately with empty results.
#[async_trait]
pub trait VolumeIsolator: Send + Sync {
    /// Rebuild claim state after an agent restart, reconciled against the
    /// agent's live and orphan container lists
    async fn recover(&self, live: &[ContainerId], orphans: &[ContainerId]) -> Result<()>;

    /// Claim and, where needed, mount every volume the container's
    /// configuration requests; returns the volume bindings for launch, or
    /// `None` when no volumes were requested
    async fn prepare(
        &self,
        container_id: ContainerId,
        env: &[(String, String)],
    ) -> Result<Option<ContainerLaunchInfo>>;

    /// Release the container's claims, unmounting identities that drop to
    /// zero holders; idempotent, and never fails on unmount errors
    async fn cleanup(&self, container_id: &ContainerId) -> Result<()>;

    /// No-op; mounts are established during prepare
    async fn isolate(&self, container_id: &ContainerId, pid: u32) -> Result<()>;

    /// No-op; no limitations are enforced
    async fn watch(&self, container_id: &ContainerId) -> Result<()>;

    /// No-op; nothing to adjust
    async fn update(&self, container_id: &ContainerId, resources: &ResourceLimits) -> Result<()>;

    /// No usage statistics are gathered
    async fn usage(&self, container_id: &ContainerId) -> Result<ResourceUsage>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardVolumeIsolator {
    sanitizer: EnvSanitizer,
    executor: Arc<dyn MountExecutor>,
    snapshots: Arc<dyn SnapshotStore>,
    event_bus: Arc<EventBus>,
    registry: Mutex<ClaimRegistry>,
}

impl StandardVolumeIsolator {
    pub fn new(
        config: IsolatorConfig,
        executor: Arc<dyn MountExecutor>,
        snapshots: Arc<dyn SnapshotStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            sanitizer: EnvSanitizer::new(&config),
            executor,
            snapshots,
            event_bus,
            registry: Mutex::new(ClaimRegistry::new()),
        }
    }

    /// Current claims of a container (empty if unknown)
    pub async fn claims(&self, container_id: &ContainerId) -> Vec<MountDescriptor> {
        self.registry.lock().await.claims(container_id).to_vec()
    }

    /// Save the registry, keeping the in-memory state authoritative when the
    /// write fails; changes since the last good save are lost if the process
    /// dies before the next one succeeds
    async fn persist(&self, registry: &ClaimRegistry) {
        if let Err(e) = self.snapshots.save(registry).await {
            error!("Failed to save claim snapshot: {}", e);
        }
    }

    /// Unwind mounts performed earlier in a failed prepare, in reverse order
    async fn revert_mounts(&self, container_id: &ContainerId, mounted: &[MountDescriptor]) {
        for descriptor in mounted.iter().rev() {
            match self.executor.unmount(descriptor).await {
                Ok(()) => {
                    info!(
                        "Rolled back mount of volume '{}' for container {}",
                        descriptor.volume_name, container_id
                    );
                    self.event_bus.publish_mount_event(MountEvent::MountRolledBack {
                        container_id: container_id.clone(),
                        volume_name: descriptor.volume_name.clone(),
                        rolled_back_at: Utc::now(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Failed to roll back mount of volume '{}' for container {}: {}",
                        descriptor.volume_name, container_id, e
                    );
                }
            }
        }
    }
}

#[async_trait]
impl VolumeIsolator for StandardVolumeIsolator {
    async fn recover(&self, live: &[ContainerId], orphans: &[ContainerId]) -> Result<()> {
        let mut recovered = self
            .snapshots
            .load()
            .await
            .context("Failed to read claim snapshot during recovery")?
            .unwrap_or_default();

        let known: HashSet<&ContainerId> = live.iter().chain(orphans.iter()).collect();
        let dropped = recovered.retain_containers(|id| known.contains(id));

        // Dropped claims do not trigger unmounts. A stale external mount is
        // left in place rather than unmounting a volume that a component
        // recovering independently might still be using.
        for (container_id, descriptors) in &dropped {
            warn!(
                "Dropping {} recovered claim(s) of unknown container {}; external mounts left as-is",
                descriptors.len(),
                container_id
            );
            self.event_bus.publish_mount_event(MountEvent::ClaimsDropped {
                container_id: container_id.clone(),
                claim_count: descriptors.len(),
                dropped_at: Utc::now(),
            });
        }

        let mut registry = self.registry.lock().await;
        *registry = recovered;
        self.persist(&registry).await;

        info!(
            "Recovered volume claims for {} container(s), dropped {}",
            registry.len(),
            dropped.len()
        );
        Ok(())
    }

    async fn prepare(
        &self,
        container_id: ContainerId,
        env: &[(String, String)],
    ) -> Result<Option<ContainerLaunchInfo>> {
        let mut registry = self.registry.lock().await;

        if registry.contains(&container_id) {
            anyhow::bail!("container {} already holds volume claims", container_id);
        }

        let descriptors = self
            .sanitizer
            .extract(&container_id, env)
            .with_context(|| format!("rejected volume configuration of container {container_id}"))?;

        if descriptors.is_empty() {
            debug!("Container {} requests no volumes", container_id);
            return Ok(None);
        }

        info!(
            "Preparing {} volume(s) for container {}",
            descriptors.len(),
            container_id
        );

        let mut mounted: Vec<MountDescriptor> = Vec::new();
        let mut mounted_identities: HashSet<MountIdentity> = HashSet::new();

        for descriptor in &descriptors {
            let identity = descriptor.identity();
            let holders = registry.holder_count(identity);

            if holders > 0 || mounted_identities.contains(&identity) {
                debug!(
                    "Volume '{}' (driver '{}') already mounted, {} existing holder(s); recording claim only",
                    descriptor.volume_name, descriptor.volume_driver, holders
                );
                self.event_bus.publish_mount_event(MountEvent::VolumeShared {
                    container_id: container_id.clone(),
                    volume_name: descriptor.volume_name.clone(),
                    volume_driver: descriptor.volume_driver.clone(),
                    holders,
                    shared_at: Utc::now(),
                });
                continue;
            }

            match self.executor.mount(descriptor).await {
                Ok(host_path) => {
                    info!(
                        "Mounted volume '{}' (driver '{}') at {} for container {}",
                        descriptor.volume_name,
                        descriptor.volume_driver,
                        host_path.display(),
                        container_id
                    );
                    self.event_bus.publish_mount_event(MountEvent::VolumeMounted {
                        container_id: container_id.clone(),
                        volume_name: descriptor.volume_name.clone(),
                        volume_driver: descriptor.volume_driver.clone(),
                        host_path: host_path.display().to_string(),
                        mounted_at: Utc::now(),
                    });
                    mounted_identities.insert(identity);
                    mounted.push(descriptor.clone());
                }
                Err(e) => {
                    error!(
                        "Mount of volume '{}' (driver '{}') failed for container {}: {}",
                        descriptor.volume_name, descriptor.volume_driver, container_id, e
                    );
                    self.event_bus.publish_mount_event(MountEvent::MountFailed {
                        container_id: container_id.clone(),
                        volume_name: descriptor.volume_name.clone(),
                        volume_driver: descriptor.volume_driver.clone(),
                        error: e.to_string(),
                        failed_at: Utc::now(),
                    });

                    self.revert_mounts(&container_id, &mounted).await;

                    return Err(anyhow::Error::new(e).context(format!(
                        "failed to mount volume '{}' for container {}",
                        descriptor.volume_name, container_id
                    )));
                }
            }
        }

        let launch_info = ContainerLaunchInfo::from_descriptors(&descriptors);
        registry.add_claims(container_id, descriptors)?;
        self.persist(&registry).await;

        Ok(Some(launch_info))
    }

    async fn cleanup(&self, container_id: &ContainerId) -> Result<()> {
        let mut registry = self.registry.lock().await;

        let removed = registry.remove_claims(container_id);
        if removed.is_empty() {
            debug!("No volume claims for container {}; nothing to clean up", container_id);
            return Ok(());
        }

        info!(
            "Cleaning up {} volume claim(s) of container {}",
            removed.len(),
            container_id
        );

        let mut released: HashSet<MountIdentity> = HashSet::new();
        for descriptor in &removed {
            let identity = descriptor.identity();
            if !released.insert(identity) {
                continue;
            }

            let holders = registry.holder_count(identity);
            if holders > 0 {
                debug!(
                    "Volume '{}' still held by {} other container(s); leaving mounted",
                    descriptor.volume_name, holders
                );
                continue;
            }

            match self.executor.unmount(descriptor).await {
                Ok(()) => {
                    info!(
                        "Unmounted volume '{}' (driver '{}') after container {} released the last claim",
                        descriptor.volume_name, descriptor.volume_driver, container_id
                    );
                    self.event_bus.publish_mount_event(MountEvent::VolumeUnmounted {
                        container_id: container_id.clone(),
                        volume_name: descriptor.volume_name.clone(),
                        volume_driver: descriptor.volume_driver.clone(),
                        unmounted_at: Utc::now(),
                    });
                }
                Err(e) => {
                    // A container must always be able to finish stopping;
                    // the claim stays removed and the failure is surfaced
                    // through logs and events only.
                    warn!(
                        "Unmount of volume '{}' failed during cleanup of container {}: {}",
                        descriptor.volume_name, container_id, e
                    );
                    self.event_bus.publish_mount_event(MountEvent::UnmountFailed {
                        container_id: container_id.clone(),
                        volume_name: descriptor.volume_name.clone(),
                        error: e.to_string(),
                        failed_at: Utc::now(),
                    });
                }
            }
        }

        self.persist(&registry).await;
        Ok(())
    }

    async fn isolate(&self, _container_id: &ContainerId, _pid: u32) -> Result<()> {
        Ok(())
    }

    async fn watch(&self, _container_id: &ContainerId) -> Result<()> {
        Ok(())
    }

    async fn update(&self, _container_id: &ContainerId, _resources: &ResourceLimits) -> Result<()> {
        Ok(())
    }

    async fn usage(&self, _container_id: &ContainerId) -> Result<ResourceUsage> {
        Ok(ResourceUsage::default())
    }
}

// ============================================================================
// Tests
// ============================================================================
