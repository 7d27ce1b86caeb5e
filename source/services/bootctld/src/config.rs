// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: bootctl configuration (misc device location + running slot suffix)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests (defaults, overrides, validation, cmdline parsing)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bootctl::{MiscLayout, DEFAULT_SLOT_TABLE_OFFSET, DEFAULT_VIRTUAL_AB_OFFSET};
use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/bootctl.toml";
pub const DEFAULT_MISC_DEVICE: &str = "/dev/block/by-name/misc";
pub const KERNEL_CMDLINE_PATH: &str = "/proc/cmdline";

const SLOT_SUFFIX_ARG: &str = "androidboot.slot_suffix=";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("slot table at {slot_table_offset} overlaps virtual A/B record at {virtual_ab_offset}")]
    Overlap { slot_table_offset: u64, virtual_ab_offset: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootctlConfig {
    pub misc_device: PathBuf,
    pub slot_table_offset: u64,
    pub virtual_ab_offset: u64,
    /// Overrides the suffix taken from the kernel command line.
    pub slot_suffix: Option<String>,
}

impl Default for BootctlConfig {
    fn default() -> Self {
        Self {
            misc_device: PathBuf::from(DEFAULT_MISC_DEVICE),
            slot_table_offset: DEFAULT_SLOT_TABLE_OFFSET,
            virtual_ab_offset: DEFAULT_VIRTUAL_AB_OFFSET,
            slot_suffix: None,
        }
    }
}

impl BootctlConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Like [`BootctlConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!("bootctl: no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layout().overlaps() {
            return Err(ConfigError::Overlap {
                slot_table_offset: self.slot_table_offset,
                virtual_ab_offset: self.virtual_ab_offset,
            });
        }
        Ok(())
    }

    pub fn layout(&self) -> MiscLayout {
        MiscLayout {
            slot_table_offset: self.slot_table_offset,
            virtual_ab_offset: self.virtual_ab_offset,
        }
    }

    /// Configured suffix, else the one the bootloader put on the kernel
    /// command line, else `""` (current slot unknown).
    pub fn resolve_slot_suffix(&self) -> String {
        if let Some(suffix) = &self.slot_suffix {
            return suffix.clone();
        }
        match fs::read_to_string(KERNEL_CMDLINE_PATH) {
            Ok(cmdline) => slot_suffix_from_cmdline(&cmdline).unwrap_or_default().to_string(),
            Err(err) => {
                warn!("bootctl: cannot read {KERNEL_CMDLINE_PATH}: {err}");
                String::new()
            }
        }
    }
}

/// Value of the last `androidboot.slot_suffix=` argument, if any.
pub fn slot_suffix_from_cmdline(cmdline: &str) -> Option<&str> {
    cmdline
        .split_whitespace()
        .rev()
        .find_map(|arg| arg.strip_prefix(SLOT_SUFFIX_ARG))
}
