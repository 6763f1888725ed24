// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the flush loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! queue calls as it requests frames and flushes. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! [`FlushSummaryBuilder`] tallies slot outcomes during a flush and produces
//! the [`FlushSummary`] delivered at the end.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`SubmitEvent`], emitted once per
//!   submission, plus the corresponding `TraceSink` method.

use alloc::rc::Rc;
use core::cell::RefCell;

use crate::frame::FrameToken;
use crate::reduce::ReduceError;
use crate::slot::{QueueId, SlotId};
use crate::time::HostTime;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why a slot's batch did not produce a clean commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A transform ran against a slot with no value.
    Unset,
    /// A fallible transform rejected its input.
    Rejected,
    /// The value was committed but the view binding is gone.
    Detached,
    /// The slot was dropped before the flush reached it.
    Dropped,
}

impl From<&ReduceError> for FailureKind {
    fn from(err: &ReduceError) -> Self {
        match err {
            ReduceError::Unset { .. } => Self::Unset,
            ReduceError::Rejected { .. } => Self::Rejected,
        }
    }
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when an idle queue asks the host for a frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameRequestEvent {
    /// Queue that requested the frame.
    pub queue: QueueId,
    /// Index the requested flush will run with.
    pub flush_index: u64,
    /// Slot whose submission triggered the request.
    pub slot: SlotId,
    /// Token returned by the host.
    pub token: FrameToken,
}

/// Marks the start of a flush.
#[derive(Clone, Copy, Debug)]
pub struct FlushBeginEvent {
    /// Queue being flushed.
    pub queue: QueueId,
    /// Monotonic flush counter for this queue.
    pub flush_index: u64,
    /// Host time delivered by the frame callback.
    pub now: HostTime,
    /// Number of slots with pending updates.
    pub pending_slots: u32,
}

/// Emitted after a slot commits its reduced value.
#[derive(Clone, Copy, Debug)]
pub struct SlotCommitEvent {
    /// Queue being flushed.
    pub queue: QueueId,
    /// Flush counter.
    pub flush_index: u64,
    /// Slot that committed.
    pub slot: SlotId,
    /// How many submissions were folded into the commit.
    pub coalesced: u32,
}

/// Emitted when a slot's batch fails, or its view is detached.
#[derive(Clone, Copy, Debug)]
pub struct SlotFailureEvent {
    /// Queue being flushed.
    pub queue: QueueId,
    /// Flush counter.
    pub flush_index: u64,
    /// Affected slot.
    pub slot: SlotId,
    /// What went wrong.
    pub kind: FailureKind,
    /// Position of the failing update within the batch, for reduce failures.
    pub update_index: Option<u32>,
    /// Submissions in the batch.
    pub batch_len: u32,
}

/// Emitted once per submission (requires `trace-rich` feature).
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct SubmitEvent {
    /// Queue receiving the submission.
    pub queue: QueueId,
    /// Target slot.
    pub slot: SlotId,
    /// Length of the slot's pending batch after the submission.
    pub pending: u32,
}

/// Per-flush outcome summary produced by [`FlushSummaryBuilder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Queue that was flushed.
    pub queue: QueueId,
    /// Flush counter.
    pub flush_index: u64,
    /// Host time delivered by the frame callback.
    pub now: HostTime,
    /// Slots that committed a value (detached views included).
    pub slots_committed: u32,
    /// Submissions folded into those commits.
    pub updates_applied: u32,
    /// Slots whose batch failed to reduce.
    pub slots_failed: u32,
    /// Committed slots whose view binding is gone.
    pub slots_detached: u32,
    /// Slots dropped before the flush reached them.
    pub slots_dropped: u32,
    /// Slots that received submissions during the flush. They wait for the
    /// next frame.
    pub deferred_slots: u32,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from a queue.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
///
/// A sink runs with no queue state borrowed. Events emitted while the sink is
/// already running (a sink that submits updates, say) are not delivered to it.
/// A sink may call [`set_trace_sink`](crate::queue::CoalescingQueue::set_trace_sink)
/// or [`take_trace_sink`](crate::queue::CoalescingQueue::take_trace_sink) on
/// its own queue from inside an event.
pub trait TraceSink {
    /// Called when the queue requests a frame from the host.
    fn on_frame_request(&mut self, e: &FrameRequestEvent) {
        _ = e;
    }

    /// Called when a flush starts.
    fn on_flush_begin(&mut self, e: &FlushBeginEvent) {
        _ = e;
    }

    /// Called after a slot commits.
    fn on_slot_commit(&mut self, e: &SlotCommitEvent) {
        _ = e;
    }

    /// Called when a slot's batch fails or its view is detached.
    fn on_slot_failure(&mut self, e: &SlotFailureEvent) {
        _ = e;
    }

    /// Called with the summary at the end of every flush.
    fn on_flush_summary(&mut self, s: &FlushSummary) {
        _ = s;
    }

    /// Called for every submission (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_submit(&mut self, e: &SubmitEvent) {
        _ = e;
    }
}

/// Lets a caller keep a handle to a sink it installed into a queue.
impl<S: TraceSink + ?Sized> TraceSink for Rc<RefCell<S>> {
    fn on_frame_request(&mut self, e: &FrameRequestEvent) {
        self.borrow_mut().on_frame_request(e);
    }

    fn on_flush_begin(&mut self, e: &FlushBeginEvent) {
        self.borrow_mut().on_flush_begin(e);
    }

    fn on_slot_commit(&mut self, e: &SlotCommitEvent) {
        self.borrow_mut().on_slot_commit(e);
    }

    fn on_slot_failure(&mut self, e: &SlotFailureEvent) {
        self.borrow_mut().on_slot_failure(e);
    }

    fn on_flush_summary(&mut self, s: &FlushSummary) {
        self.borrow_mut().on_flush_summary(s);
    }

    #[cfg(feature = "trace-rich")]
    fn on_submit(&mut self, e: &SubmitEvent) {
        self.borrow_mut().on_submit(e);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`FrameRequestEvent`].
    #[inline]
    pub fn frame_request(&mut self, e: &FrameRequestEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_frame_request(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FlushBeginEvent`].
    #[inline]
    pub fn flush_begin(&mut self, e: &FlushBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_flush_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SlotCommitEvent`].
    #[inline]
    pub fn slot_commit(&mut self, e: &SlotCommitEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_slot_commit(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SlotFailureEvent`].
    #[inline]
    pub fn slot_failure(&mut self, e: &SlotFailureEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_slot_failure(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FlushSummary`].
    #[inline]
    pub fn flush_summary(&mut self, s: &FlushSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_flush_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits a [`SubmitEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn submit(&mut self, e: &SubmitEvent) {
        if let Some(s) = &mut self.sink {
            s.on_submit(e);
        }
    }
}

// ---------------------------------------------------------------------------
// FlushSummaryBuilder
// ---------------------------------------------------------------------------

/// Tallies slot outcomes during a flush and produces a [`FlushSummary`].
#[derive(Debug)]
pub struct FlushSummaryBuilder {
    summary: FlushSummary,
}

impl FlushSummaryBuilder {
    /// Starts a summary for the flush described by `begin`.
    #[must_use]
    pub fn new(begin: &FlushBeginEvent) -> Self {
        Self {
            summary: FlushSummary {
                queue: begin.queue,
                flush_index: begin.flush_index,
                now: begin.now,
                ..FlushSummary::default()
            },
        }
    }

    /// Records a slot that committed `coalesced` submissions.
    pub fn committed(&mut self, coalesced: u32) {
        self.summary.slots_committed += 1;
        self.summary.updates_applied += coalesced;
    }

    /// Records a failure of the given kind.
    ///
    /// A [`FailureKind::Detached`] slot has already been counted by
    /// [`committed`](Self::committed).
    pub fn failed(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::Unset | FailureKind::Rejected => self.summary.slots_failed += 1,
            FailureKind::Detached => self.summary.slots_detached += 1,
            FailureKind::Dropped => self.summary.slots_dropped += 1,
        }
    }

    /// Consumes the builder. `deferred_slots` is the queue's pending count
    /// after the last commit.
    #[must_use]
    pub fn finish(self, deferred_slots: u32) -> FlushSummary {
        FlushSummary {
            deferred_slots,
            ..self.summary
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;

    fn sample_begin() -> FlushBeginEvent {
        FlushBeginEvent {
            queue: QueueId(3),
            flush_index: 42,
            now: HostTime(1_000_000),
            pending_slots: 4,
        }
    }

    #[test]
    fn failure_kind_from_reduce_error() {
        assert_eq!(
            FailureKind::from(&ReduceError::Unset { index: 0 }),
            FailureKind::Unset
        );
        let rejected = ReduceError::Rejected {
            index: 2,
            source: Box::from("nope"),
        };
        assert_eq!(FailureKind::from(&rejected), FailureKind::Rejected);
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_flush_begin(&sample_begin());
        sink.on_flush_summary(&FlushSummary::default());
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.flush_begin(&sample_begin());
        tracer.flush_summary(&FlushSummary::default());
    }

    #[test]
    fn summary_builder_tallies_outcomes() {
        let mut builder = FlushSummaryBuilder::new(&sample_begin());
        builder.committed(3);
        builder.committed(1);
        builder.failed(FailureKind::Detached);
        builder.failed(FailureKind::Rejected);
        builder.failed(FailureKind::Dropped);

        let summary = builder.finish(2);
        assert_eq!(summary.queue, QueueId(3));
        assert_eq!(summary.flush_index, 42);
        assert_eq!(summary.now, HostTime(1_000_000));
        assert_eq!(summary.slots_committed, 2);
        assert_eq!(summary.updates_applied, 4);
        assert_eq!(summary.slots_detached, 1);
        assert_eq!(summary.slots_failed, 1);
        assert_eq!(summary.slots_dropped, 1);
        assert_eq!(summary.deferred_slots, 2);
    }

    #[test]
    fn empty_summary_is_all_zero() {
        let summary = FlushSummaryBuilder::new(&sample_begin()).finish(0);
        assert_eq!(summary.slots_committed, 0);
        assert_eq!(summary.updates_applied, 0);
        assert_eq!(summary.slots_failed, 0);
        assert_eq!(summary.deferred_slots, 0);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            flushes: Vec<u64>,
        }
        impl TraceSink for RecordingSink {
            fn on_flush_begin(&mut self, e: &FlushBeginEvent) {
                self.flushes.push(e.flush_index);
            }
        }

        let mut sink = RecordingSink {
            flushes: Vec::new(),
        };
        let mut tracer = Tracer::new(&mut sink);
        tracer.flush_begin(&sample_begin());
        // Access sink after tracer is dropped.
        drop(tracer);
        assert_eq!(sink.flushes, &[42]);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn shared_sink_stays_readable() {
        #[derive(Default)]
        struct Count(u32);
        impl TraceSink for Count {
            fn on_flush_summary(&mut self, _s: &FlushSummary) {
                self.0 += 1;
            }
        }

        let shared = Rc::new(RefCell::new(Count::default()));
        let mut handle = Rc::clone(&shared);
        Tracer::new(&mut handle).flush_summary(&FlushSummary::default());
        assert_eq!(shared.borrow().0, 1);
    }
}
