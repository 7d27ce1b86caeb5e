// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: A/B slot table codec (32-byte, CRC-protected misc record)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit + property tests
//!   - encode/decode round-trip, reserved bytes preserved
//!   - magic/version/CRC rejection order
//!   - single-bit corruption detection
//!
//! Layout (all offsets in bytes):
//!   0..4   magic "\0AB0"
//!   4      version_major
//!   5      version_minor
//!   6..8   reserved
//!   8..12  slot A: priority, tries_remaining, successful_boot, reserved
//!   12..16 slot B
//!   16..28 reserved
//!   28..32 CRC-32 of bytes 0..28, little-endian
//!
//! A table that fails any check is rejected, never repaired.

use thiserror::Error;

use crate::checksum::crc32;
use crate::slot::{Slot, SlotRecord, MAX_PRIORITY, MAX_TRIES};

pub const SLOT_TABLE_SIZE: usize = 32;
pub const SLOT_TABLE_MAGIC: [u8; 4] = *b"\0AB0";
pub const SLOT_TABLE_MAJOR_VERSION: u8 = 1;
pub const SLOT_TABLE_MINOR_VERSION: u8 = 0;

const VERSION_MAJOR_OFFSET: usize = 4;
const VERSION_MINOR_OFFSET: usize = 5;
const RESERVED1_OFFSET: usize = 6;
const SLOTS_OFFSET: usize = 8;
const SLOT_RECORD_SIZE: usize = 4;
const RESERVED2_OFFSET: usize = 16;
const CRC_OFFSET: usize = 28;

/// Integrity failures of on-disk metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("bad magic {found:02x?}")]
    BadMagic { found: [u8; 4] },
    #[error("unsupported version {found} (max supported {supported})")]
    UnsupportedVersion { found: u8, supported: u8 },
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// Decoded A/B slot table. The CRC is not stored; it is derived on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTable {
    pub version_major: u8,
    pub version_minor: u8,
    pub reserved1: [u8; 2],
    pub slots: [SlotRecord; 2],
    pub reserved2: [u8; 12],
}

impl SlotTable {
    /// Factory layout: A preferred with full tries, B one priority below.
    pub fn provisioned() -> Self {
        let fresh = SlotRecord {
            priority: MAX_PRIORITY,
            tries_remaining: MAX_TRIES,
            successful_boot: false,
            reserved: 0,
        };
        Self {
            version_major: SLOT_TABLE_MAJOR_VERSION,
            version_minor: SLOT_TABLE_MINOR_VERSION,
            reserved1: [0; 2],
            slots: [fresh, SlotRecord { priority: MAX_PRIORITY - 1, ..fresh }],
            reserved2: [0; 12],
        }
    }

    pub fn slot(&self, slot: Slot) -> &SlotRecord {
        &self.slots[slot.index()]
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut SlotRecord {
        &mut self.slots[slot.index()]
    }

    /// Validates magic, then version, then CRC.
    pub fn decode(bytes: &[u8; SLOT_TABLE_SIZE]) -> Result<Self, MetadataError> {
        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != SLOT_TABLE_MAGIC {
            return Err(MetadataError::BadMagic { found: magic });
        }

        // Newer major versions may reinterpret the slot fields; do not touch them.
        let version_major = bytes[VERSION_MAJOR_OFFSET];
        if version_major > SLOT_TABLE_MAJOR_VERSION {
            return Err(MetadataError::UnsupportedVersion {
                found: version_major,
                supported: SLOT_TABLE_MAJOR_VERSION,
            });
        }

        let stored = u32::from_le_bytes([
            bytes[CRC_OFFSET],
            bytes[CRC_OFFSET + 1],
            bytes[CRC_OFFSET + 2],
            bytes[CRC_OFFSET + 3],
        ]);
        let computed = crc32(&bytes[..CRC_OFFSET]);
        if stored != computed {
            return Err(MetadataError::ChecksumMismatch { stored, computed });
        }

        let mut reserved2 = [0u8; 12];
        reserved2.copy_from_slice(&bytes[RESERVED2_OFFSET..CRC_OFFSET]);

        Ok(Self {
            version_major,
            version_minor: bytes[VERSION_MINOR_OFFSET],
            reserved1: [bytes[RESERVED1_OFFSET], bytes[RESERVED1_OFFSET + 1]],
            slots: [decode_slot(bytes, 0), decode_slot(bytes, 1)],
            reserved2,
        })
    }

    /// Serializes and stamps a freshly computed CRC.
    pub fn encode(&self) -> [u8; SLOT_TABLE_SIZE] {
        let mut buf = [0u8; SLOT_TABLE_SIZE];
        buf[..4].copy_from_slice(&SLOT_TABLE_MAGIC);
        buf[VERSION_MAJOR_OFFSET] = self.version_major;
        buf[VERSION_MINOR_OFFSET] = self.version_minor;
        buf[RESERVED1_OFFSET..SLOTS_OFFSET].copy_from_slice(&self.reserved1);
        for (i, slot) in self.slots.iter().enumerate() {
            let at = SLOTS_OFFSET + i * SLOT_RECORD_SIZE;
            buf[at] = slot.priority;
            buf[at + 1] = slot.tries_remaining;
            buf[at + 2] = u8::from(slot.successful_boot);
            buf[at + 3] = slot.reserved;
        }
        buf[RESERVED2_OFFSET..CRC_OFFSET].copy_from_slice(&self.reserved2);

        let crc = crc32(&buf[..CRC_OFFSET]);
        buf[CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        buf
    }
}

fn decode_slot(bytes: &[u8; SLOT_TABLE_SIZE], index: usize) -> SlotRecord {
    let at = SLOTS_OFFSET + index * SLOT_RECORD_SIZE;
    SlotRecord {
        priority: bytes[at],
        tries_remaining: bytes[at + 1],
        successful_boot: bytes[at + 2] != 0,
        reserved: bytes[at + 3],
    }
}
