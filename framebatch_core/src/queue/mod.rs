// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The frame-coalescing update queue.
//!
//! A [`CoalescingQueue`] maps each slot with pending work to the ordered list
//! of updates submitted since the last flush. The first submission into an
//! idle queue requests a frame from the queue's [`FrameRequester`]; every later
//! submission before that frame fires only appends. When the frame fires the
//! queue flushes: it clears the frame token, takes every pending list, then
//! folds and commits each slot's list in turn.
//!
//! # Frame lifecycle
//!
//! ```text
//!   Idle ──submit──► Requesting ──request_frame returns──► Scheduled(token)
//!    ▲                                                        │
//!    └───────────────────── flush(now) ◄── frame fires ───────┘
//! ```
//!
//! The queue never holds a borrow of its own state while user code runs, so
//! a commit may submit more updates (they schedule the next frame), drop
//! slots, or create new ones.
//!
//! # Failure isolation
//!
//! Each slot's batch succeeds or fails on its own. A batch whose fold fails is
//! dropped for that flush and never retried; other slots still commit. Slots
//! dropped before the flush reaches them are skipped. Every outcome is
//! reported through the queue's [`TraceSink`] and in the [`FlushSummary`]
//! delivered to the flush listener.

mod batch;
mod flush;
mod table;

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::frame::{FrameRequester, FrameToken};
use crate::reduce::ReduceError;
use crate::slot::{QueueId, SlotId, SlotInner};
use crate::trace::{FlushSummary, FrameRequestEvent, TraceSink, Tracer};
use crate::update::Update;

use table::SlotTable;

/// Per-queue settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    /// Identity reported in trace events.
    pub id: QueueId,
    /// Slot table capacity reserved up front.
    pub initial_capacity: usize,
}

impl QueueConfig {
    /// Settings for the process-wide queue.
    #[must_use]
    pub const fn global() -> Self {
        Self {
            id: QueueId::GLOBAL,
            initial_capacity: 64,
        }
    }

    /// Settings for a queue owned by a scope.
    #[must_use]
    pub const fn scoped(id: QueueId) -> Self {
        Self {
            id,
            initial_capacity: 16,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::global()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameState {
    /// Nothing pending, no frame requested.
    Idle,
    /// `request_frame` is running.
    Requesting,
    /// A frame is outstanding.
    Scheduled(FrameToken),
}

struct QueueState {
    table: SlotTable,
    frame: FrameState,
    /// Flushes started; the next flush's index.
    flushes: u64,
    /// Flushes whose commits have all run.
    completed: u64,
}

type FlushListener = Box<dyn FnMut(&FlushSummary)>;
type ErrorListener = Box<dyn FnMut(SlotId, &ReduceError)>;

pub(crate) struct QueueShared {
    config: QueueConfig,
    requester: Box<dyn FrameRequester>,
    state: RefCell<QueueState>,
    sink: RefCell<Option<Box<dyn TraceSink>>>,
    /// Bumped whenever the sink is replaced or removed.
    sink_epoch: Cell<u64>,
    flush_listener: RefCell<Option<FlushListener>>,
    error_listener: RefCell<Option<ErrorListener>>,
}

impl Drop for QueueShared {
    fn drop(&mut self) {
        if let FrameState::Scheduled(token) = self.state.get_mut().frame {
            self.requester.cancel_frame(token);
        }
    }
}

/// A queue of pending slot updates flushed once per frame.
///
/// Clones refer to the same queue. The queue lives while any clone does;
/// slots only hold weak references to it. Dropping the last clone cancels an
/// outstanding frame request.
#[derive(Clone)]
pub struct CoalescingQueue {
    shared: Rc<QueueShared>,
}

impl CoalescingQueue {
    /// Creates a scoped queue with a fresh [`QueueId`].
    #[must_use]
    pub fn new(requester: impl FrameRequester + 'static) -> Self {
        Self::with_config(QueueConfig::scoped(QueueId::next_scoped()), requester)
    }

    /// Creates a queue with explicit settings.
    #[must_use]
    pub fn with_config(config: QueueConfig, requester: impl FrameRequester + 'static) -> Self {
        Self {
            shared: Rc::new(QueueShared {
                config,
                requester: Box::new(requester),
                state: RefCell::new(QueueState {
                    table: SlotTable::with_capacity(config.initial_capacity),
                    frame: FrameState::Idle,
                    flushes: 0,
                    completed: 0,
                }),
                sink: RefCell::new(None),
                sink_epoch: Cell::new(0),
                flush_listener: RefCell::new(None),
                error_listener: RefCell::new(None),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Rc<QueueShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> Weak<QueueShared> {
        Rc::downgrade(&self.shared)
    }

    /// Returns the queue's identity.
    #[must_use]
    pub fn id(&self) -> QueueId {
        self.shared.config.id
    }

    /// Returns the queue's settings.
    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Returns the number of completed flushes.
    ///
    /// A flush counts once all of its commits have run, before the flush
    /// listener is called.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.shared.state.borrow().completed
    }

    /// Returns the number of slots with pending updates.
    #[must_use]
    pub fn pending_slots(&self) -> usize {
        self.shared.state.borrow().table.pending_slots()
    }

    /// Returns the number of slots registered in this queue.
    #[must_use]
    pub fn live_slots(&self) -> usize {
        self.shared.state.borrow().table.live_slots()
    }

    /// Returns `true` while a frame request is outstanding.
    #[must_use]
    pub fn has_scheduled_flush(&self) -> bool {
        self.shared.state.borrow().frame != FrameState::Idle
    }

    /// Returns `true` if both handles refer to the same queue.
    #[must_use]
    pub fn same_queue(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Installs a trace sink, returning the previous one.
    ///
    /// Events are only dispatched when the `trace` feature is enabled. A sink
    /// may call this from inside an event; the new sink receives the events
    /// that follow, and the running one is dropped once it returns.
    pub fn set_trace_sink(&self, sink: impl TraceSink + 'static) -> Option<Box<dyn TraceSink>> {
        self.bump_sink_epoch();
        self.shared.sink.borrow_mut().replace(Box::new(sink))
    }

    /// Removes and returns the trace sink.
    ///
    /// Called from inside an event, it returns `None` and the running sink is
    /// dropped once it returns.
    pub fn take_trace_sink(&self) -> Option<Box<dyn TraceSink>> {
        self.bump_sink_epoch();
        self.shared.sink.borrow_mut().take()
    }

    fn bump_sink_epoch(&self) {
        let epoch = &self.shared.sink_epoch;
        epoch.set(epoch.get().wrapping_add(1));
    }

    /// Sets a callback run with the summary at the end of every flush.
    ///
    /// This is where a host re-renders a subtree once per flush.
    pub fn set_flush_listener(&self, listener: impl FnMut(&FlushSummary) + 'static) {
        *self.shared.flush_listener.borrow_mut() = Some(Box::new(listener));
    }

    /// Sets a callback run for every slot whose batch fails to reduce.
    pub fn set_error_listener(&self, listener: impl FnMut(SlotId, &ReduceError) + 'static) {
        *self.shared.error_listener.borrow_mut() = Some(Box::new(listener));
    }

    pub(crate) fn register(&self) -> SlotId {
        self.shared.state.borrow_mut().table.register()
    }

    pub(crate) fn release(&self, id: SlotId) {
        let discarded = self.shared.state.borrow_mut().table.release(id);
        // Outside the borrow: the batch's updates may own slot handles.
        drop(discarded);
    }

    /// Appends `update` to the slot's pending list, requesting a frame if the
    /// queue was idle.
    pub(crate) fn submit<T: Clone + 'static>(&self, slot: &Rc<SlotInner<T>>, update: Update<T>) {
        let (pushed, request) = {
            let mut state = self.shared.state.borrow_mut();
            let pushed = state.table.push(slot, update);
            let request = pushed.is_ok() && state.frame == FrameState::Idle;
            if request {
                state.frame = FrameState::Requesting;
            }
            (pushed, request)
        };
        match pushed {
            #[cfg(feature = "trace-rich")]
            Ok(pending) => self.trace(|t| {
                t.submit(&crate::trace::SubmitEvent {
                    queue: self.id(),
                    slot: slot.id,
                    pending: saturating_u32(pending),
                });
            }),
            #[cfg(not(feature = "trace-rich"))]
            Ok(_) => {}
            // Not registered here; drop it outside the borrow.
            Err(update) => drop(update),
        }
        if request {
            self.request_flush(slot.id);
        }
    }

    fn request_flush(&self, trigger: SlotId) {
        let queue = self.downgrade();
        let token = self.shared.requester.request_frame(Box::new(move |now| {
            if let Some(shared) = queue.upgrade() {
                Self::from_shared(shared).flush(now);
            }
        }));
        let flush_index = {
            let mut state = self.shared.state.borrow_mut();
            // A host may run the callback before returning; the flush then
            // already reset the state and the token is spent.
            if state.frame == FrameState::Requesting {
                state.frame = FrameState::Scheduled(token);
            }
            state.flushes
        };
        self.trace(|t| {
            t.frame_request(&FrameRequestEvent {
                queue: self.id(),
                flush_index,
                slot: trigger,
                token,
            });
        });
    }

    /// Runs `f` with a tracer over the installed sink.
    ///
    /// The sink is moved out of the queue while it runs, so events raised
    /// meanwhile are not delivered to it. It goes back afterwards unless it
    /// was replaced or removed in the meantime.
    fn trace(&self, f: impl FnOnce(&mut Tracer<'_>)) {
        let taken = self.shared.sink.borrow_mut().take();
        let Some(mut sink) = taken else {
            return;
        };
        let epoch = self.shared.sink_epoch.get();
        f(&mut Tracer::new(sink.as_mut()));
        if self.shared.sink_epoch.get() == epoch {
            let mut slot = self.shared.sink.borrow_mut();
            if slot.is_none() {
                *slot = Some(sink);
                return;
            }
        }
        drop(sink);
    }
}

impl fmt::Debug for CoalescingQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CoalescingQueue");
        s.field("id", &self.id());
        if let Ok(state) = self.shared.state.try_borrow() {
            s.field("frame", &state.frame)
                .field("flushes", &state.completed)
                .field("pending_slots", &state.table.pending_slots());
        }
        s.finish_non_exhaustive()
    }
}

pub(crate) fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
