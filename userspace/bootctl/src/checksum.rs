// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: CRC-32 integrity guard for on-disk boot metadata
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit + property tests (check value, single-byte sensitivity)
//!
//! Standard reflected CRC-32 (polynomial 0xEDB88320, init all-ones, final
//! complement). `crc32fast` carries its lookup tables as immutable statics, so
//! there is no runtime table setup and no shared mutable state.

/// CRC-32 of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}
