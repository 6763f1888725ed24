// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slot identity allocation and pending batch storage.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;

use understory_dirty::{CycleHandling, DirtyTracker};

use super::batch::{Batch, PendingBatch};
use crate::dirty;
use crate::slot::{SlotId, SlotInner};
use crate::update::Update;

/// Generational slot table.
///
/// Index `i` holds the generation and the pending batch (if any) of the slot
/// allocated at `i`. Slots with a batch are marked on the
/// [`PENDING`](dirty::PENDING) channel.
pub(crate) struct SlotTable {
    generation: Vec<u32>,
    live: Vec<bool>,
    free_list: Vec<u32>,
    len: u32,
    batches: Vec<Option<Box<dyn PendingBatch>>>,
    dirty: DirtyTracker<u32>,
}

impl SlotTable {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            generation: Vec::with_capacity(capacity),
            live: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
            batches: Vec::with_capacity(capacity),
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
        }
    }

    /// Allocates an identity, reusing a released index when one is free.
    pub(crate) fn register(&mut self) -> SlotId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed index.
            self.generation[idx as usize] += 1;
            self.live[idx as usize] = true;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.generation.push(0);
            self.live.push(true);
            self.batches.push(None);
            idx
        };
        SlotId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Frees `id` and hands back its pending batch for the caller to drop
    /// outside any borrow.
    ///
    /// Stale identities are ignored.
    pub(crate) fn release(&mut self, id: SlotId) -> Option<Box<dyn PendingBatch>> {
        if !self.is_live(id) {
            return None;
        }
        let idx = id.idx;
        self.dirty.remove_key(idx);
        self.live[idx as usize] = false;
        self.free_list.push(idx);
        self.batches[idx as usize].take()
    }

    /// Returns whether `id` refers to a registered slot.
    pub(crate) fn is_live(&self, id: SlotId) -> bool {
        let idx = id.idx as usize;
        id.idx < self.len && self.live[idx] && self.generation[idx] == id.generation
    }

    /// Appends `update` to the slot's batch and returns the batch length.
    ///
    /// Gives the update back if the slot is not registered here.
    pub(crate) fn push<T: Clone + 'static>(
        &mut self,
        slot: &Rc<SlotInner<T>>,
        update: Update<T>,
    ) -> Result<usize, Update<T>> {
        let id = slot.id;
        if !self.is_live(id) {
            return Err(update);
        }
        let idx = id.idx as usize;
        if let Some(batch) = self.batches[idx]
            .as_mut()
            .and_then(|batch| batch.as_any_mut().downcast_mut::<Batch<T>>())
        {
            batch.push(update);
            return Ok(batch.len());
        }
        debug_assert!(
            self.batches[idx].is_none(),
            "pending batch of {id:?} has a different value type"
        );
        self.batches[idx] = Some(Box::new(Batch::new(slot, update)));
        self.dirty.mark(id.idx, dirty::PENDING);
        Ok(1)
    }

    /// Takes every pending batch, leaving the table with none.
    pub(crate) fn take_pending(&mut self) -> Vec<(SlotId, Box<dyn PendingBatch>)> {
        let touched: Vec<u32> = self
            .dirty
            .drain(dirty::PENDING)
            .deterministic()
            .run()
            .collect();
        touched
            .into_iter()
            .filter_map(|idx| {
                let batch = self.batches.get_mut(idx as usize)?.take()?;
                let generation = self.generation[idx as usize];
                Some((SlotId { idx, generation }, batch))
            })
            .collect()
    }

    /// Number of slots with a pending batch.
    pub(crate) fn pending_slots(&self) -> usize {
        self.batches.iter().filter(|batch| batch.is_some()).count()
    }

    /// Number of registered slots.
    pub(crate) fn live_slots(&self) -> usize {
        self.live.iter().filter(|live| **live).count()
    }
}
