//! # Signals
//!
//! Slot identifiers and the bitmask a barrier uses to track which of its
//! slots have fired.

use serde::{Deserialize, Serialize};

/// Maximum number of signals a single barrier can await.
pub const MAX_SIGNALS: usize = 64;

/// Index of a signal slot.
///
/// Only meaningful for the barrier that issued it. Passing an id from a
/// different barrier is answered with [`SignalOutcome::Unknown`] when the
/// index is out of range, or marks the slot with that index otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(pub(crate) u8);

impl SignalId {
    /// Slot index within its barrier.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a single `on_signal` call did to the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SignalOutcome {
    /// Slot marked, other signals still outstanding
    Recorded,
    /// Slot was already marked; payload refreshed if one was given
    Duplicate,
    /// Primary slot delivered no payload and the config withholds it
    Withheld,
    /// This arrival completed the barrier and the listener ran
    Completed,
    /// Barrier had already fired, nothing happened
    AlreadyFired,
    /// Barrier was torn down by its owner, nothing happened
    Cancelled,
    /// Id does not belong to this barrier
    Unknown,
}

impl SignalOutcome {
    /// Whether this call moved the barrier into its fired state.
    pub fn completed(self) -> bool {
        self == SignalOutcome::Completed
    }
}

/// Fixed-size set of fired slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SignalSet {
    bits: u64,
}

impl SignalSet {
    pub(crate) fn contains(&self, id: SignalId) -> bool {
        self.bits & (1u64 << id.0) != 0
    }

    pub(crate) fn insert(&mut self, id: SignalId) {
        self.bits |= 1u64 << id.0;
    }

    pub(crate) fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// True once every slot below `arity` is set.
    pub(crate) fn is_full(&self, arity: usize) -> bool {
        self.bits == full_mask(arity)
    }
}

fn full_mask(arity: usize) -> u64 {
    if arity >= MAX_SIGNALS {
        u64::MAX
    } else {
        (1u64 << arity) - 1
    }
}
