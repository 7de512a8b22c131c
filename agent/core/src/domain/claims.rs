// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Claim Registry
//!
//! The core bookkeeping state: which containers hold a claim on which
//! external mounts. The holder count for a mount identity is recomputed by
//! scanning the registry rather than kept in a separate counter; at the
//! expected scale (tens of containers per host) the scan is cheap and cannot
//! drift out of sync with the claims themselves.
//!
//! The registry performs no I/O and no locking. Callers serialize all
//! read-modify-write sequences (see `StandardVolumeIsolator`).

use crate::domain::mount::{ContainerId, MountDescriptor, MountIdentity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Multi-valued mapping from container to the volume claims it holds
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ClaimRegistry {
    claims: HashMap<ContainerId, Vec<MountDescriptor>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptors held by a container; empty for unknown containers
    pub fn claims(&self, container_id: &ContainerId) -> &[MountDescriptor] {
        self.claims
            .get(container_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, container_id: &ContainerId) -> bool {
        self.claims.contains_key(container_id)
    }

    /// Number of distinct containers currently claiming the given identity
    ///
    /// A count > 0 implies the external volume is mounted on the host;
    /// 0 implies it is not.
    pub fn holder_count(&self, identity: MountIdentity) -> usize {
        self.claims
            .values()
            .filter(|descriptors| descriptors.iter().any(|d| d.identity() == identity))
            .count()
    }

    /// Install a container's full descriptor set
    ///
    /// Prepare claims all of a container's volumes at once, so a container
    /// that already has an entry is a lifecycle violation.
    pub fn add_claims(
        &mut self,
        container_id: ContainerId,
        descriptors: Vec<MountDescriptor>,
    ) -> Result<(), ClaimError> {
        if self.claims.contains_key(&container_id) {
            return Err(ClaimError::DuplicateContainer(container_id));
        }
        self.claims.insert(container_id, descriptors);
        Ok(())
    }

    /// Remove and return a container's descriptors
    ///
    /// Unknown containers yield an empty set, keeping cleanup idempotent.
    pub fn remove_claims(&mut self, container_id: &ContainerId) -> Vec<MountDescriptor> {
        self.claims.remove(container_id).unwrap_or_default()
    }

    /// Drop every entry whose container the predicate rejects, returning the
    /// dropped entries for logging
    pub fn retain_containers<F>(&mut self, keep: F) -> Vec<(ContainerId, Vec<MountDescriptor>)>
    where
        F: Fn(&ContainerId) -> bool,
    {
        let dropped_ids: Vec<ContainerId> = self
            .claims
            .keys()
            .filter(|id| !keep(id))
            .cloned()
            .collect();

        dropped_ids
            .into_iter()
            .map(|id| {
                let descriptors = self.claims.remove(&id).unwrap_or_default();
                (id, descriptors)
            })
            .collect()
    }

    pub fn container_ids(&self) -> impl Iterator<Item = &ContainerId> {
        self.claims.keys()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("container {0} already holds volume claims")]
    DuplicateContainer(ContainerId),
}
