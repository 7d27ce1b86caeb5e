// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Boot control service facade – HAL-shaped results over the slot and merge managers
//! OWNERS: @services-team
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests + host E2E (tests/bootctl_host)

use std::io;

use bootctl::{
    BootCtlError, BootSlotManager, ErrorClass, MergeStatus, MergeStatusManager, MiscLayout,
    SlotTable,
};
use log::{error, info, warn};
use storage::{FileDevice, MiscDevice};

use crate::config::BootctlConfig;

/// Outcome of a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    /// 0 on success.
    pub errno: i32,
    pub err_msg: String,
}

impl CommandResult {
    fn from_result(result: bootctl::Result<()>) -> Self {
        match result {
            Ok(()) => Self { success: true, errno: 0, err_msg: String::new() },
            Err(err) => {
                let errno = errno_for(&err);
                Self {
                    success: false,
                    errno,
                    err_msg: format!("{err} ({})", io::Error::from_raw_os_error(errno)),
                }
            }
        }
    }
}

/// Answer of a yes/no slot query; `InvalidSlot` means "could not tell".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolResult {
    False,
    True,
    InvalidSlot,
}

impl From<bootctl::Result<bool>> for BoolResult {
    fn from(result: bootctl::Result<bool>) -> Self {
        match result {
            Ok(true) => BoolResult::True,
            Ok(false) => BoolResult::False,
            Err(err) => {
                warn!("bootctl: query failed: {err}");
                BoolResult::InvalidSlot
            }
        }
    }
}

/// errno equivalent of a boot control failure.
pub fn errno_for(err: &BootCtlError) -> i32 {
    match (err, err.class()) {
        (BootCtlError::Storage(storage), _) => storage.raw_os_error().unwrap_or(libc::EIO),
        (_, ErrorClass::Io) => libc::EIO,
        (_, ErrorClass::Format) => libc::EBADMSG,
        (_, ErrorClass::Argument) => libc::EINVAL,
        (_, ErrorClass::State) => libc::EPERM,
        (_, ErrorClass::Unavailable) => libc::EAGAIN,
    }
}

pub struct BootControlService<D> {
    slots: BootSlotManager<D>,
    merge: MergeStatusManager<D>,
}

impl BootControlService<FileDevice> {
    /// Service over the configured misc device and running slot.
    pub fn from_config(config: &BootctlConfig) -> Self {
        let suffix = config.resolve_slot_suffix();
        let service =
            Self::new(FileDevice::new(&config.misc_device), config.layout(), &suffix);
        info!(
            "bootctl: misc={} running suffix={suffix:?}",
            config.misc_device.display()
        );
        service
    }
}

impl<D: MiscDevice + Clone> BootControlService<D> {
    pub fn new(device: D, layout: MiscLayout, running_suffix: &str) -> Self {
        let slots = BootSlotManager::new(device.clone(), layout.slot_table_offset, running_suffix);
        let merge =
            MergeStatusManager::new(device, layout.virtual_ab_offset, slots.current_slot());
        Self { slots, merge }
    }
}

impl<D: MiscDevice> BootControlService<D> {
    pub fn get_number_slots(&self) -> u32 {
        self.slots.number_of_slots()
    }

    /// Index of the running slot, `None` if the boot suffix was not recognized.
    pub fn get_current_slot(&self) -> Option<u32> {
        self.slots.current_slot().map(|slot| slot.index() as u32)
    }

    pub fn mark_boot_successful(&self) -> CommandResult {
        CommandResult::from_result(self.slots.mark_current_slot_successful())
    }

    pub fn set_active_boot_slot(&self, slot: u32) -> CommandResult {
        CommandResult::from_result(self.slots.set_active_slot(slot))
    }

    pub fn set_slot_as_unbootable(&self, slot: u32) -> CommandResult {
        CommandResult::from_result(self.slots.set_slot_unbootable(slot))
    }

    pub fn is_slot_bootable(&self, slot: u32) -> BoolResult {
        self.slots.is_slot_bootable(slot).into()
    }

    pub fn is_slot_marked_successful(&self, slot: u32) -> BoolResult {
        self.slots.is_slot_marked_successful(slot).into()
    }

    /// `""` for a slot that does not exist.
    pub fn get_suffix(&self, slot: u32) -> String {
        self.slots.suffix_of(slot).to_string()
    }

    pub fn set_snapshot_merge_status(&self, status: MergeStatus) -> bool {
        match self.merge.set_merge_status(status) {
            Ok(()) => true,
            Err(err) => {
                error!("bootctl: set merge status {status} failed: {err}");
                false
            }
        }
    }

    pub fn get_snapshot_merge_status(&self) -> MergeStatus {
        self.merge.get_merge_status()
    }

    /// Slot table exactly as stored.
    pub fn dump(&self) -> bootctl::Result<SlotTable> {
        self.slots.load()
    }

    /// Writes the factory slot table. Without `force`, only a table that
    /// fails validation is replaced: a valid one is left alone (`Ok(false)`)
    /// and a read failure is returned as is.
    pub fn provision(&self, force: bool) -> bootctl::Result<bool> {
        if !force {
            match self.slots.load() {
                Ok(_) => return Ok(false),
                Err(BootCtlError::Metadata(err)) => {
                    warn!("bootctl: replacing invalid slot table: {err}");
                }
                Err(err) => return Err(err),
            }
        }
        self.slots.write_table(&SlotTable::provisioned())?;
        info!("bootctl: slot table provisioned");
        Ok(true)
    }
}
