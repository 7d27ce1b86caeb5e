// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Boot control error types

use storage::StorageError;
use thiserror::Error;

use crate::metadata::MetadataError;
use crate::slot::Slot;

pub type Result<T> = core::result::Result<T, BootCtlError>;

/// Failures surfaced by the slot and merge-status managers.
#[derive(Debug, Error)]
pub enum BootCtlError {
    /// Misc device I/O failed.
    #[error("misc i/o failed: {0}")]
    Storage(#[from] StorageError),
    /// Stored metadata failed validation.
    #[error("slot metadata rejected: {0}")]
    Metadata(#[from] MetadataError),
    /// Slot index outside `0..NUM_SLOTS`.
    #[error("invalid slot index {0}")]
    InvalidSlot(u32),
    /// The running slot suffix did not map to a slot.
    #[error("current slot is unknown")]
    CurrentSlotUnknown,
    /// Refused to mark a slot successful that should not have booted.
    #[error("slot {0} is not bootable")]
    SlotNotBootable(Slot),
}

/// Coarse failure category used at the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Io,
    Format,
    Argument,
    State,
    Unavailable,
}

impl BootCtlError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Storage(_) => ErrorClass::Io,
            Self::Metadata(_) => ErrorClass::Format,
            Self::InvalidSlot(_) => ErrorClass::Argument,
            Self::SlotNotBootable(_) => ErrorClass::State,
            Self::CurrentSlotUnknown => ErrorClass::Unavailable,
        }
    }
}
