// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod volume_isolator;

// Re-export the isolator surface for convenience
pub use volume_isolator::{ResourceLimits, ResourceUsage, StandardVolumeIsolator, VolumeIsolator};
