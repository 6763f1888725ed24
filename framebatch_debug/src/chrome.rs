// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Each flush becomes a `B`/`E` duration pair on the queue's track, with
//! commits and failures as instant events inside it. Requests and
//! submissions carry no timestamp of their own and are placed at the start
//! of the most recent flush on their queue.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::collections::HashMap;
use std::io::{self, Write};

use serde_json::{Value, json};

use framebatch_core::slot::SlotId;
use framebatch_core::time::Timebase;

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    // Start of the latest flush per queue, in µs.
    let mut last_flush: HashMap<u32, f64> = HashMap::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::FrameRequest(e) => {
                let ts = last_flush.get(&e.queue.0).copied().unwrap_or(0.0);
                events.push(json!({
                    "ph": "i",
                    "name": "FrameRequest",
                    "cat": "Queue",
                    "ts": ts,
                    "pid": e.queue.0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "next_flush": e.flush_index,
                        "slot": slot_label(e.slot),
                        "token": e.token.0,
                    }
                }));
            }
            RecordedEvent::FlushBegin(e) => {
                let ts = ticks_to_us(e.now.ticks(), timebase);
                last_flush.insert(e.queue.0, ts);
                events.push(json!({
                    "ph": "B",
                    "name": "Flush",
                    "cat": "Flush",
                    "ts": ts,
                    "pid": e.queue.0,
                    "tid": 0,
                    "args": {
                        "flush_index": e.flush_index,
                        "pending_slots": e.pending_slots,
                    }
                }));
            }
            RecordedEvent::SlotCommit(e) => {
                let ts = last_flush.get(&e.queue.0).copied().unwrap_or(0.0);
                events.push(json!({
                    "ph": "i",
                    "name": "Commit",
                    "cat": "Slot",
                    "ts": ts,
                    "pid": e.queue.0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "flush_index": e.flush_index,
                        "slot": slot_label(e.slot),
                        "coalesced": e.coalesced,
                    }
                }));
            }
            RecordedEvent::SlotFailure(e) => {
                let ts = last_flush.get(&e.queue.0).copied().unwrap_or(0.0);
                events.push(json!({
                    "ph": "i",
                    "name": "Failure",
                    "cat": "Slot",
                    "ts": ts,
                    "pid": e.queue.0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "flush_index": e.flush_index,
                        "slot": slot_label(e.slot),
                        "kind": format!("{:?}", e.kind),
                        "update_index": e.update_index,
                        "batch_len": e.batch_len,
                    }
                }));
            }
            RecordedEvent::FlushSummary(s) => {
                events.push(json!({
                    "ph": "E",
                    "name": "Flush",
                    "cat": "Flush",
                    "ts": ticks_to_us(s.now.ticks(), timebase),
                    "pid": s.queue.0,
                    "tid": 0,
                    "args": {
                        "flush_index": s.flush_index,
                        "slots_committed": s.slots_committed,
                        "updates_applied": s.updates_applied,
                        "slots_failed": s.slots_failed,
                        "slots_detached": s.slots_detached,
                        "slots_dropped": s.slots_dropped,
                        "deferred_slots": s.deferred_slots,
                    }
                }));
            }
            RecordedEvent::Submit(e) => {
                let ts = last_flush.get(&e.queue.0).copied().unwrap_or(0.0);
                events.push(json!({
                    "ph": "i",
                    "name": "Submit",
                    "cat": "Rich",
                    "ts": ts,
                    "pid": e.queue.0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "slot": slot_label(e.slot),
                        "pending": e.pending,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn ticks_to_us(ticks: u64, timebase: Timebase) -> f64 {
    timebase.ticks_to_nanos(ticks) as f64 / 1000.0
}

fn slot_label(id: SlotId) -> String {
    format!("{}@{}", id.index(), id.generation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use framebatch_core::slot::QueueId;
    use framebatch_core::time::HostTime;
    use framebatch_core::trace::{
        FlushBeginEvent, FlushSummary, SlotCommitEvent, SubmitEvent, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let queue = QueueId(1);
        let mut rec = RecorderSink::new();
        rec.on_flush_begin(&FlushBeginEvent {
            queue,
            flush_index: 0,
            now: HostTime(1_000_000),
            pending_slots: 1,
        });
        rec.on_slot_commit(&SlotCommitEvent {
            queue,
            flush_index: 0,
            slot: SlotId::from_raw(0, 0),
            coalesced: 3,
        });
        rec.on_flush_summary(&FlushSummary {
            queue,
            flush_index: 0,
            now: HostTime(1_000_000),
            slots_committed: 1,
            updates_applied: 3,
            ..FlushSummary::default()
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), Timebase::NANOS, &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "Flush");
        assert_eq!(parsed[0]["pid"], 1);

        // The commit sits at the flush start.
        assert_eq!(parsed[1]["ph"], "i");
        assert_eq!(parsed[1]["name"], "Commit");
        assert_eq!(parsed[1]["ts"], parsed[0]["ts"]);
        assert_eq!(parsed[1]["args"]["coalesced"], 3);

        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["args"]["updates_applied"], 3);
    }

    #[test]
    fn submit_before_any_flush_is_at_zero() {
        let mut rec = RecorderSink::new();
        rec.on_submit(&SubmitEvent {
            queue: QueueId(3),
            slot: SlotId::from_raw(1, 0),
            pending: 1,
        });
        let mut out = Vec::new();
        export(rec.as_bytes(), Timebase::NANOS, &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["name"], "Submit");
        assert_eq!(parsed[0]["ts"], 0.0);
        assert_eq!(parsed[0]["args"]["slot"], "1@0");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], Timebase::NANOS, &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
