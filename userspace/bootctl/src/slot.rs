// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: A/B slot identity and per-slot boot state machine
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit + property tests
//!   - bootability truth table
//!   - normalization into canonical form
//!   - suffix/index mapping

use core::fmt;

/// Number of boot slots on the device.
pub const NUM_SLOTS: u32 = 2;

/// Highest slot priority; 0 means unbootable.
pub const MAX_PRIORITY: u8 = 15;

/// Boot attempts granted to a freshly activated slot.
pub const MAX_TRIES: u8 = 7;

const SUFFIXES: [&str; NUM_SLOTS as usize] = ["_a", "_b"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub const ALL: [Slot; NUM_SLOTS as usize] = [Slot::A, Slot::B];

    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }

    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Slot::A),
            1 => Some(Slot::B),
            _ => None,
        }
    }

    /// Partition suffix, e.g. `"_a"`.
    pub fn suffix(self) -> &'static str {
        SUFFIXES[self.index()]
    }

    /// Maps a running-slot suffix to a slot; anything unknown (including `""`) is `None`.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Slot::ALL.into_iter().find(|slot| slot.suffix() == suffix)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Boot state of one slot as stored in the slot table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotRecord {
    pub priority: u8,
    pub tries_remaining: u8,
    pub successful_boot: bool,
    pub reserved: u8,
}

impl SlotRecord {
    /// State of a slot that was just made active.
    #[must_use]
    pub fn activated(self) -> Self {
        Self {
            priority: MAX_PRIORITY,
            tries_remaining: MAX_TRIES,
            successful_boot: false,
            ..self
        }
    }

    pub fn is_bootable(&self) -> bool {
        self.priority > 0 && (self.successful_boot || self.tries_remaining > 0)
    }

    /// Forces priority, tries and success to zero. The reserved byte is kept.
    #[must_use]
    pub fn unbootable(self) -> Self {
        Self {
            priority: 0,
            tries_remaining: 0,
            successful_boot: false,
            ..self
        }
    }

    /// Canonical form: exhausted, illegal (tries left while already
    /// successful) and zero-priority slots all collapse to unbootable.
    /// Priority and tries are clamped to `MAX_PRIORITY` and `MAX_TRIES`.
    #[must_use]
    pub fn normalized(self) -> Self {
        let exhausted = self.tries_remaining == 0 && !self.successful_boot;
        let illegal = self.tries_remaining > 0 && self.successful_boot;
        if self.priority == 0 || exhausted || illegal {
            return self.unbootable();
        }
        Self {
            priority: self.priority.min(MAX_PRIORITY),
            tries_remaining: self.tries_remaining.min(MAX_TRIES),
            ..self
        }
    }

    /// Records a completed boot; the remaining tries are no longer needed.
    #[must_use]
    pub fn marked_successful(self) -> Self {
        Self {
            tries_remaining: 0,
            successful_boot: true,
            ..self
        }
    }
}
