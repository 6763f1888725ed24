// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].

use framebatch_core::frame::FrameToken;
use framebatch_core::slot::{QueueId, SlotId};
use framebatch_core::time::HostTime;
use framebatch_core::trace::{
    FailureKind, FlushBeginEvent, FlushSummary, FrameRequestEvent, SlotCommitEvent,
    SlotFailureEvent, SubmitEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_FRAME_REQUEST: u8 = 1;
const TAG_FLUSH_BEGIN: u8 = 2;
const TAG_SLOT_COMMIT: u8 = 3;
const TAG_SLOT_FAILURE: u8 = 4;
const TAG_FLUSH_SUMMARY: u8 = 5;
const TAG_SUBMIT: u8 = 6;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_option_u32(&mut self, v: Option<u32>) {
        self.write_u8(u8::from(v.is_some()));
        self.write_u32(v.unwrap_or(0));
    }

    fn write_slot(&mut self, id: SlotId) {
        self.write_u32(id.index());
        self.write_u32(id.generation());
    }

    fn write_header(&mut self, tag: u8, queue: QueueId, flush_index: u64) {
        self.write_u8(tag);
        self.write_u32(queue.0);
        self.write_u64(flush_index);
    }

    fn write_kind(&mut self, kind: FailureKind) {
        self.write_u8(match kind {
            FailureKind::Unset => 0,
            FailureKind::Rejected => 1,
            FailureKind::Detached => 2,
            FailureKind::Dropped => 3,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_frame_request(&mut self, e: &FrameRequestEvent) {
        self.write_header(TAG_FRAME_REQUEST, e.queue, e.flush_index);
        self.write_slot(e.slot);
        self.write_u64(e.token.0);
    }

    fn on_flush_begin(&mut self, e: &FlushBeginEvent) {
        self.write_header(TAG_FLUSH_BEGIN, e.queue, e.flush_index);
        self.write_u64(e.now.ticks());
        self.write_u32(e.pending_slots);
    }

    fn on_slot_commit(&mut self, e: &SlotCommitEvent) {
        self.write_header(TAG_SLOT_COMMIT, e.queue, e.flush_index);
        self.write_slot(e.slot);
        self.write_u32(e.coalesced);
    }

    fn on_slot_failure(&mut self, e: &SlotFailureEvent) {
        self.write_header(TAG_SLOT_FAILURE, e.queue, e.flush_index);
        self.write_slot(e.slot);
        self.write_kind(e.kind);
        self.write_option_u32(e.update_index);
        self.write_u32(e.batch_len);
    }

    fn on_flush_summary(&mut self, s: &FlushSummary) {
        self.write_header(TAG_FLUSH_SUMMARY, s.queue, s.flush_index);
        self.write_u64(s.now.ticks());
        self.write_u32(s.slots_committed);
        self.write_u32(s.updates_applied);
        self.write_u32(s.slots_failed);
        self.write_u32(s.slots_detached);
        self.write_u32(s.slots_dropped);
        self.write_u32(s.deferred_slots);
    }

    fn on_submit(&mut self, e: &SubmitEvent) {
        // Submissions are not tied to a flush; record the queue only.
        self.write_u8(TAG_SUBMIT);
        self.write_u32(e.queue.0);
        self.write_slot(e.slot);
        self.write_u32(e.pending);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`FrameRequestEvent`].
    FrameRequest(FrameRequestEvent),
    /// A [`FlushBeginEvent`].
    FlushBegin(FlushBeginEvent),
    /// A [`SlotCommitEvent`].
    SlotCommit(SlotCommitEvent),
    /// A [`SlotFailureEvent`].
    SlotFailure(SlotFailureEvent),
    /// A [`FlushSummary`].
    FlushSummary(FlushSummary),
    /// A [`SubmitEvent`].
    Submit(SubmitEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_option_u32(&mut self) -> Option<Option<u32>> {
        let present = self.read_u8()?;
        let val = self.read_u32()?;
        Some((present != 0).then_some(val))
    }

    fn read_slot(&mut self) -> Option<SlotId> {
        Some(SlotId::from_raw(self.read_u32()?, self.read_u32()?))
    }

    fn read_kind(&mut self) -> Option<FailureKind> {
        Some(match self.read_u8()? {
            0 => FailureKind::Unset,
            1 => FailureKind::Rejected,
            2 => FailureKind::Detached,
            _ => FailureKind::Dropped,
        })
    }

    fn read_header(&mut self) -> Option<(QueueId, u64)> {
        Some((QueueId(self.read_u32()?), self.read_u64()?))
    }

    fn decode_frame_request(&mut self) -> Option<RecordedEvent> {
        let (queue, flush_index) = self.read_header()?;
        Some(RecordedEvent::FrameRequest(FrameRequestEvent {
            queue,
            flush_index,
            slot: self.read_slot()?,
            token: FrameToken(self.read_u64()?),
        }))
    }

    fn decode_flush_begin(&mut self) -> Option<RecordedEvent> {
        let (queue, flush_index) = self.read_header()?;
        Some(RecordedEvent::FlushBegin(FlushBeginEvent {
            queue,
            flush_index,
            now: HostTime(self.read_u64()?),
            pending_slots: self.read_u32()?,
        }))
    }

    fn decode_slot_commit(&mut self) -> Option<RecordedEvent> {
        let (queue, flush_index) = self.read_header()?;
        Some(RecordedEvent::SlotCommit(SlotCommitEvent {
            queue,
            flush_index,
            slot: self.read_slot()?,
            coalesced: self.read_u32()?,
        }))
    }

    fn decode_slot_failure(&mut self) -> Option<RecordedEvent> {
        let (queue, flush_index) = self.read_header()?;
        Some(RecordedEvent::SlotFailure(SlotFailureEvent {
            queue,
            flush_index,
            slot: self.read_slot()?,
            kind: self.read_kind()?,
            update_index: self.read_option_u32()?,
            batch_len: self.read_u32()?,
        }))
    }

    fn decode_flush_summary(&mut self) -> Option<RecordedEvent> {
        let (queue, flush_index) = self.read_header()?;
        Some(RecordedEvent::FlushSummary(FlushSummary {
            queue,
            flush_index,
            now: HostTime(self.read_u64()?),
            slots_committed: self.read_u32()?,
            updates_applied: self.read_u32()?,
            slots_failed: self.read_u32()?,
            slots_detached: self.read_u32()?,
            slots_dropped: self.read_u32()?,
            deferred_slots: self.read_u32()?,
        }))
    }

    fn decode_submit(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Submit(SubmitEvent {
            queue: QueueId(self.read_u32()?),
            slot: self.read_slot()?,
            pending: self.read_u32()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_FRAME_REQUEST => self.decode_frame_request(),
            TAG_FLUSH_BEGIN => self.decode_flush_begin(),
            TAG_SLOT_COMMIT => self.decode_slot_commit(),
            TAG_SLOT_FAILURE => self.decode_slot_failure(),
            TAG_FLUSH_SUMMARY => self.decode_flush_summary(),
            TAG_SUBMIT => self.decode_submit(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const QUEUE: QueueId = QueueId(4);

    fn sample_summary() -> FlushSummary {
        FlushSummary {
            queue: QUEUE,
            flush_index: 9,
            now: HostTime(1_000_000),
            slots_committed: 3,
            updates_applied: 11,
            slots_failed: 1,
            slots_detached: 0,
            slots_dropped: 2,
            deferred_slots: 1,
        }
    }

    fn record_flush(rec: &mut RecorderSink) {
        rec.on_frame_request(&FrameRequestEvent {
            queue: QUEUE,
            flush_index: 9,
            slot: SlotId::from_raw(0, 0),
            token: FrameToken(17),
        });
        rec.on_flush_begin(&FlushBeginEvent {
            queue: QUEUE,
            flush_index: 9,
            now: HostTime(1_000_000),
            pending_slots: 2,
        });
        rec.on_slot_commit(&SlotCommitEvent {
            queue: QUEUE,
            flush_index: 9,
            slot: SlotId::from_raw(0, 0),
            coalesced: 5,
        });
        rec.on_slot_failure(&SlotFailureEvent {
            queue: QUEUE,
            flush_index: 9,
            slot: SlotId::from_raw(1, 3),
            kind: FailureKind::Rejected,
            update_index: Some(2),
            batch_len: 4,
        });
        rec.on_flush_summary(&sample_summary());
    }

    #[test]
    fn flush_sequence_decodes_in_order() {
        let mut rec = RecorderSink::new();
        record_flush(&mut rec);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 5);
        match &events[0] {
            RecordedEvent::FrameRequest(e) => {
                assert_eq!(e.queue, QUEUE);
                assert_eq!(e.token, FrameToken(17));
            }
            other => panic!("expected FrameRequest, got {other:?}"),
        }
        assert!(matches!(events[1], RecordedEvent::FlushBegin(_)));
        match &events[2] {
            RecordedEvent::SlotCommit(e) => {
                assert_eq!(e.slot, SlotId::from_raw(0, 0));
                assert_eq!(e.coalesced, 5);
            }
            other => panic!("expected SlotCommit, got {other:?}"),
        }
        match &events[3] {
            RecordedEvent::SlotFailure(e) => {
                assert_eq!(e.slot, SlotId::from_raw(1, 3));
                assert_eq!(e.kind, FailureKind::Rejected);
                assert_eq!(e.update_index, Some(2));
                assert_eq!(e.batch_len, 4);
            }
            other => panic!("expected SlotFailure, got {other:?}"),
        }
        match &events[4] {
            RecordedEvent::FlushSummary(s) => assert_eq!(*s, sample_summary()),
            other => panic!("expected FlushSummary, got {other:?}"),
        }
    }

    #[test]
    fn failure_without_update_index() {
        let mut rec = RecorderSink::new();
        rec.on_slot_failure(&SlotFailureEvent {
            queue: QUEUE,
            flush_index: 0,
            slot: SlotId::from_raw(2, 0),
            kind: FailureKind::Dropped,
            update_index: None,
            batch_len: 1,
        });
        match decode(rec.as_bytes()).next() {
            Some(RecordedEvent::SlotFailure(e)) => {
                assert_eq!(e.kind, FailureKind::Dropped);
                assert_eq!(e.update_index, None);
            }
            other => panic!("expected SlotFailure, got {other:?}"),
        }
    }

    #[test]
    fn submit_round_trips() {
        let mut rec = RecorderSink::new();
        rec.on_submit(&SubmitEvent {
            queue: QUEUE,
            slot: SlotId::from_raw(6, 1),
            pending: 3,
        });
        match decode(rec.as_bytes()).next() {
            Some(RecordedEvent::Submit(e)) => {
                assert_eq!(e.slot, SlotId::from_raw(6, 1));
                assert_eq!(e.pending, 3);
            }
            other => panic!("expected Submit, got {other:?}"),
        }
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        record_flush(&mut rec);
        let bytes = rec.into_bytes();
        let events: Vec<_> = decode(&bytes[..bytes.len() - 3]).collect();
        assert_eq!(events.len(), 4, "the cut summary must be dropped");
    }
}
