// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Virtual A/B merge-status record codec (64-byte misc record)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests (reinitialization paths, reserved bytes, encode validation)
//!
//! Layout: version(1) | magic(4, LE) | merge_status(1) | source_slot(1) | reserved(57)
//!
//! Unlike the slot table, an invalid record is not an error: losing merge
//! progress is recoverable, so decoding falls back to a fresh record.

use core::fmt;

use log::warn;

use crate::metadata::MetadataError;
use crate::slot::Slot;

pub const VIRTUAL_AB_RECORD_SIZE: usize = 64;
pub const VIRTUAL_AB_MAGIC: u32 = 0x5674_0AB0;
pub const VIRTUAL_AB_VERSION: u8 = 2;

const MAGIC_OFFSET: usize = 1;
const MERGE_STATUS_OFFSET: usize = 5;
const SOURCE_SLOT_OFFSET: usize = 6;
const RESERVED_OFFSET: usize = 7;
const RESERVED_LEN: usize = VIRTUAL_AB_RECORD_SIZE - RESERVED_OFFSET;

/// Snapshot merge progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MergeStatus {
    None = 0,
    Unknown = 1,
    Snapshotted = 2,
    Merging = 3,
    Cancelled = 4,
}

impl MergeStatus {
    pub const ALL: [MergeStatus; 5] = [
        MergeStatus::None,
        MergeStatus::Unknown,
        MergeStatus::Snapshotted,
        MergeStatus::Merging,
        MergeStatus::Cancelled,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|status| *status as u8 == v)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MergeStatus::None => "none",
            MergeStatus::Unknown => "unknown",
            MergeStatus::Snapshotted => "snapshotted",
            MergeStatus::Merging => "merging",
            MergeStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MergeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown merge status: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAbRecord {
    pub version: u8,
    pub merge_status: MergeStatus,
    pub source_slot: Slot,
    pub reserved: [u8; RESERVED_LEN],
}

impl VirtualAbRecord {
    /// Fresh record: current version, no merge in flight.
    pub fn initial(source_slot: Slot) -> Self {
        Self {
            version: VIRTUAL_AB_VERSION,
            merge_status: MergeStatus::None,
            source_slot,
            reserved: [0; RESERVED_LEN],
        }
    }

    /// Decodes `bytes`, or returns [`VirtualAbRecord::initial`] for
    /// `running_slot` when magic, version, status or slot fail validation.
    pub fn decode_or_init(bytes: &[u8; VIRTUAL_AB_RECORD_SIZE], running_slot: Slot) -> Self {
        match Self::parse(bytes) {
            Ok(record) => record,
            Err(reason) => {
                warn!("virtual-ab: reinitializing record ({reason})");
                Self::initial(running_slot)
            }
        }
    }

    fn parse(bytes: &[u8; VIRTUAL_AB_RECORD_SIZE]) -> Result<Self, String> {
        let magic = u32::from_le_bytes([
            bytes[MAGIC_OFFSET],
            bytes[MAGIC_OFFSET + 1],
            bytes[MAGIC_OFFSET + 2],
            bytes[MAGIC_OFFSET + 3],
        ]);
        if magic != VIRTUAL_AB_MAGIC {
            return Err(format!("bad magic {magic:#010x}"));
        }
        let version = bytes[0];
        // Version 0 was never written by any producer.
        if version == 0 || version > VIRTUAL_AB_VERSION {
            return Err(format!("unsupported version {version}"));
        }
        let merge_status = MergeStatus::from_u8(bytes[MERGE_STATUS_OFFSET])
            .ok_or_else(|| format!("bad merge status {}", bytes[MERGE_STATUS_OFFSET]))?;
        let source_slot = Slot::from_index(u32::from(bytes[SOURCE_SLOT_OFFSET]))
            .ok_or_else(|| format!("bad source slot {}", bytes[SOURCE_SLOT_OFFSET]))?;

        let mut reserved = [0u8; RESERVED_LEN];
        reserved.copy_from_slice(&bytes[RESERVED_OFFSET..]);
        Ok(Self { version, merge_status, source_slot, reserved })
    }

    /// Serializes the record; refuses versions this code cannot vouch for.
    pub fn encode(&self) -> Result<[u8; VIRTUAL_AB_RECORD_SIZE], MetadataError> {
        if self.version > VIRTUAL_AB_VERSION {
            return Err(MetadataError::UnsupportedVersion {
                found: self.version,
                supported: VIRTUAL_AB_VERSION,
            });
        }
        let mut buf = [0u8; VIRTUAL_AB_RECORD_SIZE];
        buf[0] = self.version;
        buf[MAGIC_OFFSET..MERGE_STATUS_OFFSET].copy_from_slice(&VIRTUAL_AB_MAGIC.to_le_bytes());
        buf[MERGE_STATUS_OFFSET] = self.merge_status as u8;
        buf[SOURCE_SLOT_OFFSET] = self.source_slot.index() as u8;
        buf[RESERVED_OFFSET..].copy_from_slice(&self.reserved);
        Ok(buf)
    }
}
