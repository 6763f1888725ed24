// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased per-slot batches of pending updates.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::any::Any;

use crate::reduce::{ReduceError, reduce};
use crate::slot::SlotInner;
use crate::update::Update;

/// What applying a batch did.
#[derive(Debug)]
pub(crate) enum BatchOutcome {
    /// The reduced value was committed and the view notified.
    Committed,
    /// The reduced value was committed but the view binding is gone.
    Detached,
    /// Reduction failed; nothing was committed.
    Failed(ReduceError),
    /// The slot no longer exists.
    Dropped,
}

/// A slot's pending updates with the slot's value type erased, so one table
/// can hold batches for slots of any type.
pub(crate) trait PendingBatch {
    /// Number of submissions in the batch.
    fn len(&self) -> usize;

    /// Reduces the batch against the slot's committed value and commits the
    /// result.
    fn apply(self: Box<Self>) -> BatchOutcome;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct Batch<T> {
    slot: Weak<SlotInner<T>>,
    ops: Vec<Update<T>>,
}

impl<T: 'static> Batch<T> {
    pub(crate) fn new(slot: &Rc<SlotInner<T>>, first: Update<T>) -> Self {
        let mut ops = Vec::with_capacity(4);
        ops.push(first);
        Self {
            slot: Rc::downgrade(slot),
            ops,
        }
    }

    pub(crate) fn push(&mut self, update: Update<T>) {
        self.ops.push(update);
    }
}

impl<T: Clone + 'static> PendingBatch for Batch<T> {
    fn len(&self) -> usize {
        self.ops.len()
    }

    fn apply(self: Box<Self>) -> BatchOutcome {
        let Self { slot, ops } = *self;
        let Some(slot) = slot.upgrade() else {
            return BatchOutcome::Dropped;
        };
        match reduce(slot.read(), ops) {
            Ok(Some(value)) => match slot.commit(value) {
                Ok(()) => BatchOutcome::Committed,
                Err(_detached) => BatchOutcome::Detached,
            },
            // A batch holds at least one update, and a successful fold over a
            // non-empty batch always yields a value.
            Ok(None) => BatchOutcome::Committed,
            Err(err) => BatchOutcome::Failed(err),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
