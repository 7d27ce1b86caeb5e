// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Integration tests for boot control over a file-backed misc image
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 8 tests
//!
//! TEST_SCENARIOS:
//!   - test_update_flow_keeps_running_slot(): activate other slot after a good boot
//!   - test_zeroed_slots_then_activate(): freshly provisioned zero slots
//!   - test_activate_tie_break(): both slots at top priority
//!   - test_refuse_unbootable_current_slot(): on-disk bytes unchanged
//!   - test_corrupted_table_never_repaired(): CRC failure is sticky
//!   - test_virtual_ab_reinit_and_persist(): garbage record reinitialized, then persisted
//!   - test_config_file_layout(): TOML config relocates both records
//!   - test_missing_device(): I/O failures surface as invalid/unknown

use std::fs;
use std::path::Path;

use bootctl::{MergeStatus, MiscLayout, SlotRecord, SlotTable, MAX_PRIORITY, MAX_TRIES};
use bootctld::{BoolResult, BootControlService, BootctlConfig};
use storage::FileDevice;
use tempfile::NamedTempFile;

const MISC_SIZE: u64 = 64 * 1024;
const SLOT_TABLE: std::ops::Range<usize> = 2048..2080;
const VIRTUAL_AB: std::ops::Range<usize> = 32768..32832;

fn misc_image() -> NamedTempFile {
    let file = NamedTempFile::new().expect("tempfile");
    file.as_file().set_len(MISC_SIZE).expect("size misc image");
    file
}

fn write_table(path: &Path, slots: [SlotRecord; 2]) {
    let table = SlotTable { slots, ..SlotTable::provisioned() };
    let mut raw = fs::read(path).expect("read misc");
    raw[SLOT_TABLE].copy_from_slice(&table.encode());
    fs::write(path, raw).expect("write misc");
}

fn service(path: &Path, suffix: &str) -> BootControlService<FileDevice> {
    let config = BootctlConfig {
        misc_device: path.to_path_buf(),
        slot_suffix: Some(suffix.to_string()),
        ..BootctlConfig::default()
    };
    BootControlService::from_config(&config)
}

fn rec(priority: u8, tries_remaining: u8, successful_boot: bool) -> SlotRecord {
    SlotRecord { priority, tries_remaining, successful_boot, reserved: 0 }
}

#[test]
fn test_update_flow_keeps_running_slot() {
    let img = misc_image();
    let svc = service(img.path(), "_a");
    assert!(svc.provision(false).expect("provision"));

    assert!(svc.mark_boot_successful().success);
    assert_eq!(svc.is_slot_marked_successful(0), BoolResult::True);

    assert!(svc.set_active_boot_slot(1).success);
    // Current slot is the running one, not the freshly activated one.
    assert_eq!(svc.get_current_slot(), Some(0));
    assert_eq!(svc.is_slot_bootable(1), BoolResult::True);
    assert_eq!(svc.is_slot_bootable(0), BoolResult::True);
    assert_eq!(svc.is_slot_marked_successful(1), BoolResult::False);

    let table = svc.dump().expect("dump");
    assert_eq!(table.slots[1], rec(MAX_PRIORITY, MAX_TRIES, false));
    assert_eq!(table.slots[0], rec(MAX_PRIORITY - 1, 0, true));

    // After rebooting into B, B can be blessed.
    let svc = service(img.path(), "_b");
    assert!(svc.mark_boot_successful().success);
    assert_eq!(svc.is_slot_marked_successful(1), BoolResult::True);
}

#[test]
fn test_zeroed_slots_then_activate() {
    let img = misc_image();
    write_table(img.path(), [SlotRecord::default(), SlotRecord::default()]);
    let svc = service(img.path(), "_a");

    assert_eq!(svc.is_slot_bootable(0), BoolResult::False);
    assert_eq!(svc.is_slot_bootable(1), BoolResult::False);

    assert!(svc.set_active_boot_slot(1).success);
    assert_eq!(svc.get_current_slot(), Some(0));
    assert_eq!(svc.is_slot_bootable(1), BoolResult::True);
    assert_eq!(svc.is_slot_bootable(0), BoolResult::False);
}

#[test]
fn test_activate_tie_break() {
    let img = misc_image();
    write_table(img.path(), [rec(15, 0, true), rec(15, 2, false)]);
    let svc = service(img.path(), "_a");

    assert!(svc.set_active_boot_slot(1).success);
    let table = svc.dump().expect("dump");
    assert_eq!(table.slots[1].priority, 15);
    assert_eq!(table.slots[0].priority, 14);
    assert_eq!(table.slots[1].tries_remaining, MAX_TRIES);
    assert!(!table.slots[1].successful_boot);
    // Slot A is still bootable after the demotion.
    assert_eq!(svc.is_slot_bootable(0), BoolResult::True);
}

#[test]
fn test_refuse_unbootable_current_slot() {
    let img = misc_image();
    write_table(img.path(), [rec(15, 7, false), rec(14, 7, false)]);
    let svc = service(img.path(), "_b");
    assert!(svc.set_slot_as_unbootable(1).success);

    let before = fs::read(img.path()).expect("read misc");
    let result = svc.mark_boot_successful();
    assert!(!result.success);
    assert!(result.err_msg.contains("not bootable"), "{}", result.err_msg);
    assert_eq!(fs::read(img.path()).expect("read misc"), before);
}

#[test]
fn test_corrupted_table_never_repaired() {
    let img = misc_image();
    let svc = service(img.path(), "_a");
    svc.provision(false).expect("provision");

    let mut raw = fs::read(img.path()).expect("read misc");
    raw[SLOT_TABLE.start + 12] ^= 0x01; // slot B priority
    fs::write(img.path(), &raw).expect("write misc");

    assert_eq!(svc.is_slot_bootable(1), BoolResult::InvalidSlot);
    assert_eq!(svc.is_slot_marked_successful(0), BoolResult::InvalidSlot);
    assert!(!svc.mark_boot_successful().success);
    assert!(!svc.set_active_boot_slot(0).success);
    assert!(!svc.set_slot_as_unbootable(1).success);
    assert_eq!(fs::read(img.path()).expect("read misc"), raw);

    // Merge status lives in its own region and keeps working.
    assert!(svc.set_snapshot_merge_status(MergeStatus::Snapshotted));
    assert_eq!(fs::read(img.path()).expect("read misc")[SLOT_TABLE], raw[SLOT_TABLE]);
}

#[test]
fn test_virtual_ab_reinit_and_persist() {
    let img = misc_image();
    let mut raw = fs::read(img.path()).expect("read misc");
    raw[VIRTUAL_AB].fill(0xFF);
    fs::write(img.path(), &raw).expect("write misc");

    let svc = service(img.path(), "_b");
    assert_eq!(svc.get_snapshot_merge_status(), MergeStatus::None);
    assert!(svc.set_snapshot_merge_status(MergeStatus::Merging));

    // A fresh service (new process) sees the persisted record.
    let svc = service(img.path(), "_a");
    assert_eq!(svc.get_snapshot_merge_status(), MergeStatus::Merging);

    let raw = fs::read(img.path()).expect("read misc");
    let record = &raw[VIRTUAL_AB];
    assert_eq!(record[0], 2);
    assert_eq!(u32::from_le_bytes([record[1], record[2], record[3], record[4]]), 0x5674_0AB0);
    assert_eq!(record[5], MergeStatus::Merging as u8);
    assert_eq!(record[6], 1, "source slot is the slot running when the status was set");
    assert!(record[7..].iter().all(|&b| b == 0));
}

#[test]
fn test_config_file_layout() {
    let img = misc_image();
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("bootctl.toml");
    fs::write(
        &config_path,
        format!(
            "misc_device = {:?}\nslot_table_offset = 4096\nvirtual_ab_offset = 8192\nslot_suffix = \"_b\"\n",
            img.path().display().to_string()
        ),
    )
    .expect("write config");

    let config = BootctlConfig::load(&config_path).expect("load config");
    let svc = BootControlService::from_config(&config);
    assert_eq!(svc.get_current_slot(), Some(1));
    assert!(svc.provision(false).expect("provision"));
    assert!(svc.set_snapshot_merge_status(MergeStatus::Cancelled));

    let raw = fs::read(img.path()).expect("read misc");
    let bytes: &[u8; 32] = raw[4096..4128].try_into().expect("table slice");
    assert_eq!(SlotTable::decode(bytes).expect("decode"), SlotTable::provisioned());
    assert_eq!(raw[8192 + 5], MergeStatus::Cancelled as u8);
    // Default locations untouched.
    assert!(raw[SLOT_TABLE].iter().all(|&b| b == 0));
    assert!(raw[VIRTUAL_AB].iter().all(|&b| b == 0));
}

#[test]
fn test_missing_device() {
    let dir = tempfile::tempdir().expect("tempdir");
    let svc = BootControlService::new(
        FileDevice::new(dir.path().join("misc")),
        MiscLayout::default(),
        "_a",
    );
    assert_eq!(svc.is_slot_bootable(0), BoolResult::InvalidSlot);
    assert_eq!(svc.get_snapshot_merge_status(), MergeStatus::Unknown);
    assert!(!svc.set_snapshot_merge_status(MergeStatus::Merging));

    let result = svc.mark_boot_successful();
    assert!(!result.success);
    assert_ne!(result.errno, 0);
    assert!(result.err_msg.contains("failed to open"), "{}", result.err_msg);
}
