// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Selecting the queue a new slot registers into.
//!
//! A [`SchedulerScope`] owns a queue. While a scope is entered (see
//! [`SchedulerScope::enter`]), slots created through
//! [`bind`](crate::binding::bind) register into its queue; with no scope
//! entered they register into the installed global queue. The choice is made
//! once, when the slot is created, and never revisited: leaving the scope
//! later does not move the slot.
//!
//! Scopes nest. The innermost entered scope wins.
//!
//! The ambient stack and the global queue are per thread (queues are not
//! `Send`) and need the `std` feature. Without it, pass queues explicitly with
//! [`bind_in`](crate::binding::bind_in).

use crate::frame::FrameRequester;
use crate::queue::{CoalescingQueue, QueueConfig};

/// A provider owning one queue.
///
/// Clones share the queue.
#[derive(Clone, Debug)]
pub struct SchedulerScope {
    queue: CoalescingQueue,
}

impl SchedulerScope {
    /// Creates a scope with a fresh queue driven by `requester`.
    #[must_use]
    pub fn new(requester: impl FrameRequester + 'static) -> Self {
        Self {
            queue: CoalescingQueue::new(requester),
        }
    }

    /// Creates a scope whose queue uses explicit settings.
    #[must_use]
    pub fn with_config(config: QueueConfig, requester: impl FrameRequester + 'static) -> Self {
        Self {
            queue: CoalescingQueue::with_config(config, requester),
        }
    }

    /// Wraps an existing queue.
    #[must_use]
    pub fn from_queue(queue: CoalescingQueue) -> Self {
        Self { queue }
    }

    /// Returns the scope's queue.
    #[must_use]
    pub fn queue(&self) -> &CoalescingQueue {
        &self.queue
    }

    /// Render version of the scope: bumped once per completed flush, after
    /// its last commit and before the flush listener runs.
    ///
    /// Hosts compare versions to decide whether the scope's subtree needs
    /// another pass.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.queue.flush_count()
    }
}

#[cfg(feature = "std")]
pub use ambient::{
    ScopeGuard, clear_global_queue, global_queue, install_global_queue, resolve_queue,
};

#[cfg(feature = "std")]
mod ambient {
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use core::marker::PhantomData;

    use super::SchedulerScope;
    use crate::queue::CoalescingQueue;

    std::thread_local! {
        static SCOPES: RefCell<Vec<CoalescingQueue>> = const { RefCell::new(Vec::new()) };
        static GLOBAL: RefCell<Option<CoalescingQueue>> = const { RefCell::new(None) };
    }

    /// Keeps a scope entered until dropped.
    ///
    /// Dropping a guard leaves its scope and every scope entered after it, so
    /// a guard dropped out of order never leaves a stale scope on the stack.
    #[must_use = "the scope is left as soon as the guard is dropped"]
    #[derive(Debug)]
    pub struct ScopeGuard {
        depth: usize,
        _not_send: PhantomData<*const ()>,
    }

    impl Drop for ScopeGuard {
        fn drop(&mut self) {
            let popped = SCOPES.with_borrow_mut(|stack| {
                let keep = stack.len().min(self.depth - 1);
                stack.split_off(keep)
            });
            drop(popped);
        }
    }

    impl SchedulerScope {
        /// Makes this scope the innermost ambient scope on this thread.
        pub fn enter(&self) -> ScopeGuard {
            let depth = SCOPES.with_borrow_mut(|stack| {
                stack.push(self.queue.clone());
                stack.len()
            });
            ScopeGuard {
                depth,
                _not_send: PhantomData,
            }
        }

        /// Runs `f` with this scope entered.
        pub fn provide<R>(&self, f: impl FnOnce() -> R) -> R {
            let _guard = self.enter();
            f()
        }
    }

    /// Returns the queue a slot created now would register into.
    ///
    /// That is the innermost entered scope's queue, else the global queue.
    #[must_use]
    pub fn resolve_queue() -> Option<CoalescingQueue> {
        SCOPES
            .with_borrow(|stack| stack.last().cloned())
            .or_else(global_queue)
    }

    /// Installs the global queue used on this thread outside any scope,
    /// returning the previous one.
    ///
    /// Slots already registered into the previous queue keep using it.
    pub fn install_global_queue(queue: CoalescingQueue) -> Option<CoalescingQueue> {
        GLOBAL.with_borrow_mut(|global| global.replace(queue))
    }

    /// Returns the installed global queue.
    #[must_use]
    pub fn global_queue() -> Option<CoalescingQueue> {
        GLOBAL.with_borrow(Option::clone)
    }

    /// Removes the global queue.
    pub fn clear_global_queue() -> Option<CoalescingQueue> {
        GLOBAL.with_borrow_mut(Option::take)
    }
}
