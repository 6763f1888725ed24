// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slot and queue identity types.

use core::fmt;

/// Identity of a slot within its queue.
///
/// Contains both a table index and a generation counter so that an identity
/// seen in a trace never aliases a later slot that reuses the index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl SlotId {
    /// Builds an identity from its raw parts (for decoding recorded traces).
    #[inline]
    #[must_use]
    pub const fn from_raw(idx: u32, generation: u32) -> Self {
        Self { idx, generation }
    }

    /// Returns the raw table index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({}@gen{})", self.idx, self.generation)
    }
}

/// Identifies a queue instance in diagnostics.
///
/// `QueueId(0)` is reserved for the process-wide queue; scoped queues get
/// fresh ids from [`QueueId::next_scoped`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct QueueId(pub u32);

impl QueueId {
    /// The process-wide queue.
    pub const GLOBAL: Self = Self(0);

    /// Returns a fresh id for a scoped queue.
    #[must_use]
    pub fn next_scoped() -> Self {
        use core::sync::atomic::{AtomicU32, Ordering};

        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueueId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_ids_are_unique_and_never_global() {
        let a = QueueId::next_scoped();
        let b = QueueId::next_scoped();
        assert_ne!(a, b);
        assert_ne!(a, QueueId::GLOBAL);
        assert_ne!(b, QueueId::GLOBAL);
    }

    #[test]
    fn slot_id_debug_shows_generation() {
        let id = SlotId::from_raw(3, 2);
        assert_eq!(alloc::format!("{id:?}"), "SlotId(3@gen2)");
    }
}
