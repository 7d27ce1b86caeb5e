// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Concurrent Virtual A/B merge-status access
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 2 tests
//!
//! TEST_SCENARIOS:
//!   - test_concurrent_writers_leave_one_whole_record(): N writers, last one wins intact
//!   - test_readers_never_see_partial_record(): readers racing writers

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use bootctl::{
    MergeStatus, MergeStatusManager, Slot, VirtualAbRecord, DEFAULT_VIRTUAL_AB_OFFSET,
    VIRTUAL_AB_RECORD_SIZE,
};
use storage::{FileDevice, MemDevice};
use tempfile::NamedTempFile;

const ROUNDS: usize = 25;

fn misc_image() -> NamedTempFile {
    let file = NamedTempFile::new().expect("tempfile");
    file.as_file().set_len(64 * 1024).expect("size misc image");
    file
}

#[test]
fn test_concurrent_writers_leave_one_whole_record() {
    let img = misc_image();
    let mgr = Arc::new(MergeStatusManager::new(
        FileDevice::new(img.path()),
        DEFAULT_VIRTUAL_AB_OFFSET,
        Some(Slot::B),
    ));
    let barrier = Arc::new(Barrier::new(MergeStatus::ALL.len()));

    let handles: Vec<_> = MergeStatus::ALL
        .into_iter()
        .map(|status| {
            let mgr = Arc::clone(&mgr);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    mgr.set_merge_status(status).expect("set merge status");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread");
    }

    let final_status = mgr.get_merge_status();
    assert!(MergeStatus::ALL.contains(&final_status));

    let raw = fs::read(img.path()).expect("read misc");
    let start = DEFAULT_VIRTUAL_AB_OFFSET as usize;
    let bytes: &[u8; VIRTUAL_AB_RECORD_SIZE] =
        raw[start..start + VIRTUAL_AB_RECORD_SIZE].try_into().expect("record slice");
    // Decoding with the other slot as fallback proves the stored record is valid.
    let record = VirtualAbRecord::decode_or_init(bytes, Slot::A);
    assert_eq!(record.source_slot, Slot::B);
    assert_eq!(record.merge_status, final_status);
    assert_eq!(&record.encode().expect("encode"), bytes);
}

#[test]
fn test_readers_never_see_partial_record() {
    let device = Arc::new(MemDevice::new(64 * 1024));
    let mgr = Arc::new(MergeStatusManager::new(
        Arc::clone(&device),
        DEFAULT_VIRTUAL_AB_OFFSET,
        Some(Slot::A),
    ));
    mgr.set_merge_status(MergeStatus::Snapshotted).expect("seed");

    let writers = [MergeStatus::Merging, MergeStatus::Cancelled].map(|status| {
        let mgr = Arc::clone(&mgr);
        thread::spawn(move || {
            for _ in 0..ROUNDS * 4 {
                mgr.set_merge_status(status).expect("set merge status");
            }
        })
    });
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let mgr = Arc::clone(&mgr);
            thread::spawn(move || {
                for _ in 0..ROUNDS * 4 {
                    let status = mgr.get_merge_status();
                    assert!(
                        matches!(
                            status,
                            MergeStatus::Snapshotted | MergeStatus::Merging | MergeStatus::Cancelled
                        ),
                        "unexpected status {status}"
                    );
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().expect("thread");
    }
    assert!(matches!(
        mgr.get_merge_status(),
        MergeStatus::Merging | MergeStatus::Cancelled
    ));
}
