// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mount lifecycle domain events, published on the event bus for
//! observability. No component inside the crate consumes them.

use crate::domain::mount::ContainerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MountEvent {
    /// The external tool mounted a volume for its first holder
    VolumeMounted {
        container_id: ContainerId,
        volume_name: String,
        volume_driver: String,
        host_path: String,
        mounted_at: DateTime<Utc>,
    },
    /// A claim was recorded against an already-mounted volume
    VolumeShared {
        container_id: ContainerId,
        volume_name: String,
        volume_driver: String,
        holders: usize,
        shared_at: DateTime<Utc>,
    },
    /// The last holder exited and the external tool unmounted the volume
    VolumeUnmounted {
        container_id: ContainerId,
        volume_name: String,
        volume_driver: String,
        unmounted_at: DateTime<Utc>,
    },
    MountFailed {
        container_id: ContainerId,
        volume_name: String,
        volume_driver: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
    /// A volume mounted earlier in the same prepare was unwound after a
    /// later mount failed
    MountRolledBack {
        container_id: ContainerId,
        volume_name: String,
        rolled_back_at: DateTime<Utc>,
    },
    /// Unmount failed during cleanup; the claim is removed regardless
    UnmountFailed {
        container_id: ContainerId,
        volume_name: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
    /// Recovery dropped the claims of a container no longer known to the agent
    ClaimsDropped {
        container_id: ContainerId,
        claim_count: usize,
        dropped_at: DateTime<Utc>,
    },
}
