// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are converted to microseconds using a [`Timebase`].

use std::io::Write;

use framebatch_core::slot::SlotId;
use framebatch_core::time::{HostTime, Timebase};
use framebatch_core::trace::{
    FailureKind, FlushBeginEvent, FlushSummary, FrameRequestEvent, SlotCommitEvent,
    SlotFailureEvent, SubmitEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Consumes the sink, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn host_us(&self, t: HostTime) -> f64 {
        self.timebase.ticks_to_nanos(t.ticks()) as f64 / 1000.0
    }
}

fn failure_name(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Unset => "unset",
        FailureKind::Rejected => "rejected",
        FailureKind::Detached => "detached",
        FailureKind::Dropped => "dropped",
    }
}

fn slot(id: SlotId) -> String {
    format!("{}@{}", id.index(), id.generation())
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_frame_request(&mut self, e: &FrameRequestEvent) {
        let _ = writeln!(
            self.writer,
            "[request] queue={} flush={} slot={} token={}",
            e.queue.0,
            e.flush_index,
            slot(e.slot),
            e.token.0,
        );
    }

    fn on_flush_begin(&mut self, e: &FlushBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[flush:begin] queue={} flush={} at {:.1}µs pending={}",
            e.queue.0,
            e.flush_index,
            self.host_us(e.now),
            e.pending_slots,
        );
    }

    fn on_slot_commit(&mut self, e: &SlotCommitEvent) {
        let _ = writeln!(
            self.writer,
            "[commit] flush={} slot={} coalesced={}",
            e.flush_index,
            slot(e.slot),
            e.coalesced,
        );
    }

    fn on_slot_failure(&mut self, e: &SlotFailureEvent) {
        let at = e
            .update_index
            .map(|i| format!(" at update {i}"))
            .unwrap_or_default();
        let _ = writeln!(
            self.writer,
            "[failure] flush={} slot={} {}{at} batch={}",
            e.flush_index,
            slot(e.slot),
            failure_name(e.kind),
            e.batch_len,
        );
    }

    fn on_flush_summary(&mut self, s: &FlushSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] queue={} flush={} committed={} updates={} failed={} \
             detached={} dropped={} deferred={}",
            s.queue.0,
            s.flush_index,
            s.slots_committed,
            s.updates_applied,
            s.slots_failed,
            s.slots_detached,
            s.slots_dropped,
            s.deferred_slots,
        );
    }

    fn on_submit(&mut self, e: &SubmitEvent) {
        let _ = writeln!(
            self.writer,
            "[submit] queue={} slot={} pending={}",
            e.queue.0,
            slot(e.slot),
            e.pending,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framebatch_core::slot::QueueId;

    #[test]
    fn pretty_print_flush_begin() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::NANOS);
        sink.on_flush_begin(&FlushBeginEvent {
            queue: QueueId(2),
            flush_index: 1,
            now: HostTime(1_000_000),
            pending_slots: 3,
        });
        let output = String::from_utf8(sink.into_writer()).unwrap();
        assert!(output.contains("[flush:begin]"), "got: {output}");
        assert!(output.contains("flush=1"), "got: {output}");
        assert!(output.contains("1000.0µs"), "got: {output}");
    }

    #[test]
    fn pretty_print_failure_names_update() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::MICROS);
        sink.on_slot_failure(&SlotFailureEvent {
            queue: QueueId(2),
            flush_index: 4,
            slot: SlotId::from_raw(5, 1),
            kind: FailureKind::Rejected,
            update_index: Some(2),
            batch_len: 3,
        });
        let output = String::from_utf8(sink.into_writer()).unwrap();
        assert_eq!(
            output,
            "[failure] flush=4 slot=5@1 rejected at update 2 batch=3\n"
        );
    }
}
