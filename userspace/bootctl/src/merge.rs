// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Virtual A/B merge-status manager
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests + concurrent writers (tests/bootctl_host)
//!
//! One mutex spans the whole load -> mutate -> persist sequence, so
//! concurrent callers observe whole records and never lose an update.

use log::{debug, warn};
use parking_lot::Mutex;
use storage::MiscDevice;

use crate::error::{BootCtlError, Result};
use crate::slot::Slot;
use crate::virtual_ab::{MergeStatus, VirtualAbRecord, VIRTUAL_AB_RECORD_SIZE};

pub struct MergeStatusManager<D> {
    device: D,
    offset: u64,
    current: Option<Slot>,
    lock: Mutex<()>,
}

impl<D: MiscDevice> MergeStatusManager<D> {
    pub fn new(device: D, offset: u64, current: Option<Slot>) -> Self {
        Self { device, offset, current, lock: Mutex::new(()) }
    }

    /// Records `status` with the running slot as merge source.
    pub fn set_merge_status(&self, status: MergeStatus) -> Result<()> {
        let _guard = self.lock.lock();
        let current = self.current.ok_or(BootCtlError::CurrentSlotUnknown)?;

        let mut record = self.load(current)?;
        record.source_slot = current;
        record.merge_status = status;
        let bytes = record.encode()?;
        self.device.write_at(self.offset, &bytes)?;
        debug!("virtual-ab: merge status set to {status} (source {current})");
        Ok(())
    }

    /// Stored status; [`MergeStatus::Unknown`] when the record cannot be read.
    pub fn get_merge_status(&self) -> MergeStatus {
        let _guard = self.lock.lock();
        // Only used if the record needs reinitializing; the result is not persisted.
        let fallback = self.current.unwrap_or(Slot::A);
        match self.load(fallback) {
            Ok(record) => record.merge_status,
            Err(err) => {
                warn!("virtual-ab: cannot read merge status: {err}");
                MergeStatus::Unknown
            }
        }
    }

    fn load(&self, running_slot: Slot) -> Result<VirtualAbRecord> {
        let mut raw = [0u8; VIRTUAL_AB_RECORD_SIZE];
        self.device.read_at(self.offset, &mut raw)?;
        Ok(VirtualAbRecord::decode_or_init(&raw, running_slot))
    }
}
