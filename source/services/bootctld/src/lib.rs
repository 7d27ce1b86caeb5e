// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: bootctld – boot control service surface (A/B slots + Virtual A/B merge status)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests (config, facade) + host E2E (tests/bootctl_host)
//!
//! PUBLIC API: BootControlService, BootctlConfig, CommandResult, BoolResult
//! DEPENDS_ON: bootctl domain library, storage

#![forbid(unsafe_code)]

pub mod config;
mod service;

pub use config::{slot_suffix_from_cmdline, BootctlConfig, ConfigError, DEFAULT_CONFIG_PATH};
pub use service::{errno_for, BoolResult, BootControlService, CommandResult};
