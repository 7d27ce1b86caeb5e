// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Boot control domain library (A/B slot metadata + Virtual A/B merge status)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests per module + integration tests (via tests/bootctl_host)
//!   - slot table codec and CRC rejection
//!   - slot state machine and priority tie-break
//!   - merge-status reinitialization and locking
//!
//! PUBLIC API:
//!   - BootSlotManager: slot queries and mutations over the misc slot table
//!   - MergeStatusManager: locked Virtual A/B merge-status access
//!   - SlotTable / VirtualAbRecord: byte-exact codecs
//!   - Slot / SlotRecord: slot identity and per-slot state machine
//!
//! DEPENDENCIES:
//!   - crc32fast: slot table integrity
//!   - parking_lot: merge-status lock
//!   - storage: misc device access

#![forbid(unsafe_code)]

pub mod checksum;
pub mod error;
pub mod manager;
pub mod merge;
pub mod metadata;
pub mod slot;
pub mod virtual_ab;

pub use error::{BootCtlError, ErrorClass, Result};
pub use manager::BootSlotManager;
pub use merge::MergeStatusManager;
pub use metadata::{MetadataError, SlotTable, SLOT_TABLE_SIZE};
pub use slot::{Slot, SlotRecord, MAX_PRIORITY, MAX_TRIES, NUM_SLOTS};
pub use virtual_ab::{MergeStatus, VirtualAbRecord, VIRTUAL_AB_RECORD_SIZE};

/// Byte offset of the slot table inside misc.
pub const DEFAULT_SLOT_TABLE_OFFSET: u64 = 2048;

/// Byte offset of the Virtual A/B record (start of the misc system space).
pub const DEFAULT_VIRTUAL_AB_OFFSET: u64 = 32 * 1024;

/// Where the two records live inside the misc device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiscLayout {
    pub slot_table_offset: u64,
    pub virtual_ab_offset: u64,
}

impl Default for MiscLayout {
    fn default() -> Self {
        Self {
            slot_table_offset: DEFAULT_SLOT_TABLE_OFFSET,
            virtual_ab_offset: DEFAULT_VIRTUAL_AB_OFFSET,
        }
    }
}

impl MiscLayout {
    /// True if the two regions share any byte.
    pub fn overlaps(&self) -> bool {
        let slots = self.slot_table_offset..self.slot_table_offset.saturating_add(SLOT_TABLE_SIZE as u64);
        let vab = self.virtual_ab_offset
            ..self.virtual_ab_offset.saturating_add(VIRTUAL_AB_RECORD_SIZE as u64);
        slots.start < vab.end && vab.start < slots.end
    }
}
