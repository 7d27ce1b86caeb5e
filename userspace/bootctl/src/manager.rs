// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Persistent A/B slot manager over the misc slot table
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests (in-memory misc) + host E2E (tests/bootctl_host)
//!   - activate/demote tie-break
//!   - mark successful / unbootable
//!   - refusal paths leave misc untouched
//!
//! Every mutation is one read -> decode -> normalize -> transform -> encode ->
//! write cycle. Nothing is cached between calls, and a failed step writes
//! nothing. Not internally locked: concurrent mutators need outside
//! serialization or they can overwrite each other.

use log::{debug, error, warn};
use storage::MiscDevice;

use crate::error::{BootCtlError, Result};
use crate::metadata::{SlotTable, SLOT_TABLE_SIZE};
use crate::slot::{Slot, MAX_PRIORITY, NUM_SLOTS};

pub struct BootSlotManager<D> {
    device: D,
    offset: u64,
    current: Option<Slot>,
}

impl<D: MiscDevice> BootSlotManager<D> {
    /// `running_suffix` is the boot suffix of the running system (`"_a"`, `"_b"`, ...).
    pub fn new(device: D, offset: u64, running_suffix: &str) -> Self {
        let current = Slot::from_suffix(running_suffix);
        if current.is_none() {
            warn!("bootctl: unrecognized slot suffix {running_suffix:?}; current slot unknown");
        }
        Self { device, offset, current }
    }

    pub fn number_of_slots(&self) -> u32 {
        NUM_SLOTS
    }

    /// Slot the running system booted from; unaffected by `set_active_slot`.
    pub fn current_slot(&self) -> Option<Slot> {
        self.current
    }

    pub fn suffix_of(&self, index: u32) -> &'static str {
        Slot::from_index(index).map_or("", Slot::suffix)
    }

    /// Reads and validates the slot table as stored (no normalization).
    pub fn load(&self) -> Result<SlotTable> {
        let raw = self.read_raw()?;
        Ok(SlotTable::decode(&raw)?)
    }

    pub fn is_slot_bootable(&self, index: u32) -> Result<bool> {
        let slot = slot_arg(index)?;
        Ok(self.load()?.slot(slot).is_bootable())
    }

    pub fn is_slot_marked_successful(&self, index: u32) -> Result<bool> {
        let slot = slot_arg(index)?;
        Ok(self.load()?.slot(slot).successful_boot)
    }

    pub fn mark_current_slot_successful(&self) -> Result<()> {
        let slot = self.current.ok_or(BootCtlError::CurrentSlotUnknown)?;
        self.update("mark successful", |table| {
            let record = table.slot_mut(slot);
            if !record.is_bootable() {
                return Err(BootCtlError::SlotNotBootable(slot));
            }
            *record = record.marked_successful();
            Ok(())
        })
    }

    pub fn set_active_slot(&self, index: u32) -> Result<()> {
        let slot = slot_arg(index)?;
        self.update("set active", |table| {
            let target = table.slot_mut(slot);
            *target = target.activated();

            // Exactly one slot may hold top priority, and it is the one just activated.
            let other = table.slot_mut(slot.other());
            if other.priority >= MAX_PRIORITY {
                other.priority = MAX_PRIORITY - 1;
            }
            Ok(())
        })
    }

    pub fn set_slot_unbootable(&self, index: u32) -> Result<()> {
        let slot = slot_arg(index)?;
        self.update("set unbootable", |table| {
            let record = table.slot_mut(slot);
            *record = record.unbootable();
            Ok(())
        })
    }

    /// Overwrites the slot table unconditionally (provisioning only).
    pub fn write_table(&self, table: &SlotTable) -> Result<()> {
        self.device.write_at(self.offset, &table.encode())?;
        debug!("bootctl: slot table written at {}", self.offset);
        Ok(())
    }

    fn read_raw(&self) -> Result<[u8; SLOT_TABLE_SIZE]> {
        let mut raw = [0u8; SLOT_TABLE_SIZE];
        self.device.read_at(self.offset, &mut raw)?;
        Ok(raw)
    }

    fn update(
        &self,
        op: &str,
        transform: impl FnOnce(&mut SlotTable) -> Result<()>,
    ) -> Result<()> {
        let result = (|| -> Result<()> {
            let raw = self.read_raw()?;
            let mut table = SlotTable::decode(&raw)?;
            for record in table.slots.iter_mut() {
                *record = record.normalized();
            }
            transform(&mut table)?;

            let encoded = table.encode();
            if encoded == raw {
                debug!("bootctl: {op}: slot table unchanged, skipping write");
                return Ok(());
            }
            self.device.write_at(self.offset, &encoded)?;
            debug!("bootctl: {op}: slot table persisted");
            Ok(())
        })();
        if let Err(err) = &result {
            error!("bootctl: {op} failed: {err}");
        }
        result
    }
}

fn slot_arg(index: u32) -> Result<Slot> {
    Slot::from_index(index).ok_or(BootCtlError::InvalidSlot(index))
}
