// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Volume Mount Lifecycle Manager
//!
//! Mounts and unmounts network-attached storage volumes on behalf of
//! containers running under an agent host. A given external volume is
//! mounted exactly once per host no matter how many containers claim it,
//! and unmounted only when the last claiming container exits.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
