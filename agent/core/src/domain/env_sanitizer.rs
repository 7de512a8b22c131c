// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Volume Environment Sanitizer
//!
//! Extracts volume requests from a container's environment-style key/value
//! configuration. The values arrive from untrusted task definitions and are
//! later interpolated into an external command line, so driver and volume
//! names are validated against a fixed prohibited-character set before any
//! descriptor is built. This is a domain service, not infrastructure:
//! rejecting injection-bearing input is a core business rule.

use crate::domain::config::IsolatorConfig;
use crate::domain::mount::{ContainerId, MountDescriptor, MountError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Maximum number of volumes one container may request
pub const MAX_VOLUMES_PER_CONTAINER: usize = 10;

pub const VOLUME_NAME_KEY: &str = "LIBSTORAGE_VOLUME_NAME";
pub const VOLUME_DRIVER_KEY: &str = "LIBSTORAGE_VOLUME_DRIVER";
pub const VOLUME_OPTS_KEY: &str = "LIBSTORAGE_VOLUME_OPTS";
pub const VOLUME_CONTAINER_PATH_KEY: &str = "LIBSTORAGE_VOLUME_CONTAINERPATH";

/// Characters rejected in charset-limited fields (volume name, driver)
///
/// Any of these in a value that later reaches the external CLI would allow
/// argument or shell injection.
pub const PROHIBITED_CHARS: [char; 26] = [
    '%', '/', ':', ';', '\0', '<', '>', '|', '`', '$', '\'', '?', '^', '&', ' ', '{', '"', '}',
    '[', ']', '\n', '\t', '\x0B', '\x08', '\r', '\\',
];

#[derive(Debug, Error)]
pub enum SanitizerError {
    #[error("unexpected volume configuration key '{0}'")]
    UnexpectedKey(String),

    #[error("value of '{key}' contains a prohibited character")]
    ProhibitedCharacter { key: String },

    #[error(transparent)]
    InvalidDescriptor(#[from] MountError),
}

/// Extracts and validates mount descriptors from container configuration
pub struct EnvSanitizer {
    default_driver: String,
    mount_prefix: PathBuf,
}

impl EnvSanitizer {
    pub fn new(config: &IsolatorConfig) -> Self {
        Self {
            default_driver: config.default_driver.clone(),
            mount_prefix: config.mount_prefix.clone(),
        }
    }

    /// Extract up to [`MAX_VOLUMES_PER_CONTAINER`] validated descriptors
    ///
    /// Slots are addressed by the conventional key names, unindexed for the
    /// first volume and suffixed `2`..`10` for the rest. A key that begins
    /// with one of the conventional names but does not match an expected
    /// slot name fails the whole extraction; unrelated keys are ignored.
    /// Missing slots mean "no volume requested at this index".
    pub fn extract(
        &self,
        container_id: &ContainerId,
        env: &[(String, String)],
    ) -> Result<Vec<MountDescriptor>, SanitizerError> {
        let mut names: [Option<String>; MAX_VOLUMES_PER_CONTAINER] = Default::default();
        let mut drivers: [Option<String>; MAX_VOLUMES_PER_CONTAINER] = Default::default();
        let mut options: [Option<String>; MAX_VOLUMES_PER_CONTAINER] = Default::default();
        let mut paths: [Option<String>; MAX_VOLUMES_PER_CONTAINER] = Default::default();

        for (key, value) in env {
            if let Some(suffix) = key.strip_prefix(VOLUME_CONTAINER_PATH_KEY) {
                let slot = Self::slot_for(key, suffix)?;
                paths[slot] = Some(value.clone());
            } else if let Some(suffix) = key.strip_prefix(VOLUME_DRIVER_KEY) {
                let slot = Self::slot_for(key, suffix)?;
                Self::check_charset(key, value)?;
                drivers[slot] = Some(value.clone());
            } else if let Some(suffix) = key.strip_prefix(VOLUME_OPTS_KEY) {
                let slot = Self::slot_for(key, suffix)?;
                options[slot] = Some(value.clone());
            } else if let Some(suffix) = key.strip_prefix(VOLUME_NAME_KEY) {
                let slot = Self::slot_for(key, suffix)?;
                Self::check_charset(key, value)?;
                names[slot] = Some(value.clone());
            }
        }

        let mut descriptors = Vec::new();
        for slot in 0..MAX_VOLUMES_PER_CONTAINER {
            let Some(name) = names[slot].take() else {
                if drivers[slot].is_some() || options[slot].is_some() || paths[slot].is_some() {
                    warn!(
                        container = %container_id,
                        slot = slot + 1,
                        "volume fields present without a volume name; no volume requested at this index"
                    );
                }
                continue;
            };

            let driver = drivers[slot]
                .take()
                .unwrap_or_else(|| self.default_driver.clone());
            let opts = options[slot].take().unwrap_or_default();
            let mount_point = self.mount_prefix.join(&name);
            let container_path = paths[slot]
                .take()
                .map(PathBuf::from)
                .unwrap_or_else(|| mount_point.clone());

            descriptors.push(MountDescriptor::new(
                container_id.clone(),
                driver,
                name,
                mount_point,
                opts,
                container_path,
            )?);
        }

        Ok(descriptors)
    }

    /// Map a key suffix to its slot: "" is the first volume, "2".."10" the rest
    fn slot_for(key: &str, suffix: &str) -> Result<usize, SanitizerError> {
        if suffix.is_empty() {
            return Ok(0);
        }
        suffix
            .parse::<usize>()
            .ok()
            .filter(|n| (2..=MAX_VOLUMES_PER_CONTAINER).contains(n))
            .map(|n| n - 1)
            .ok_or_else(|| SanitizerError::UnexpectedKey(key.to_string()))
    }

    fn check_charset(key: &str, value: &str) -> Result<(), SanitizerError> {
        if value.chars().any(|c| PROHIBITED_CHARS.contains(&c)) {
            warn!(
                key,
                "rejecting volume configuration value containing a prohibited character"
            );
            return Err(SanitizerError::ProhibitedCharacter {
                key: key.to_string(),
            });
        }
        Ok(())
    }
}
