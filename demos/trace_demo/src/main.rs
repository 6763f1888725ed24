// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated frame loop that exercises the flush and diagnostics pipeline.
//!
//! Runs 60 manual frames. Every frame submits a burst of updates to a few
//! bound slots; the queue folds each burst into one commit per slot. Events go
//! to both a [`PrettyPrintSink`](framebatch_debug::pretty::PrettyPrintSink) and
//! a [`RecorderSink`](framebatch_debug::recorder::RecorderSink), and the
//! recording is exported as a Chrome trace JSON file.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::rc::Rc;

use framebatch_core::binding::bind;
use framebatch_core::frame::ManualFrames;
use framebatch_core::scope::SchedulerScope;
use framebatch_core::slot::{Initial, NoView, ViewBinding, ViewDetached};
use framebatch_core::time::Timebase;
use framebatch_core::trace::{
    FlushBeginEvent, FlushSummary, FrameRequestEvent, SlotCommitEvent, SlotFailureEvent,
    SubmitEvent, TraceSink,
};

use framebatch_debug::pretty::PrettyPrintSink;
use framebatch_debug::recorder::RecorderSink;

const FRAME_COUNT: u64 = 60;
/// The progress bar's view goes away after this many frames.
const DETACH_AFTER: u64 = 40;

/// Forwards every event to the pretty printer and the recorder.
#[derive(Debug)]
struct Tee {
    pretty: PrettyPrintSink,
    recorder: Rc<RefCell<RecorderSink>>,
}

impl TraceSink for Tee {
    fn on_frame_request(&mut self, e: &FrameRequestEvent) {
        self.pretty.on_frame_request(e);
        self.recorder.on_frame_request(e);
    }

    fn on_flush_begin(&mut self, e: &FlushBeginEvent) {
        self.pretty.on_flush_begin(e);
        self.recorder.on_flush_begin(e);
    }

    fn on_slot_commit(&mut self, e: &SlotCommitEvent) {
        self.pretty.on_slot_commit(e);
        self.recorder.on_slot_commit(e);
    }

    fn on_slot_failure(&mut self, e: &SlotFailureEvent) {
        self.pretty.on_slot_failure(e);
        self.recorder.on_slot_failure(e);
    }

    fn on_flush_summary(&mut self, s: &FlushSummary) {
        self.pretty.on_flush_summary(s);
        self.recorder.on_flush_summary(s);
    }

    fn on_submit(&mut self, e: &SubmitEvent) {
        self.pretty.on_submit(e);
        self.recorder.on_submit(e);
    }
}

/// A view that goes away once enough frames have run.
#[derive(Debug)]
struct ProgressBar {
    frames: ManualFrames,
}

impl ViewBinding<u32> for ProgressBar {
    fn value_committed(&mut self, _value: &u32) -> Result<(), ViewDetached> {
        if self.frames.frames_run() >= DETACH_AFTER {
            Err(ViewDetached)
        } else {
            Ok(())
        }
    }
}

fn main() {
    let timebase = Timebase::NANOS;

    // -- sinks -------------------------------------------------------------
    let recorder = Rc::new(RefCell::new(RecorderSink::new()));
    let stdout: Box<dyn Write> = Box::new(std::io::stdout());
    let tee = Tee {
        pretty: PrettyPrintSink::with_writer(stdout, timebase),
        recorder: Rc::clone(&recorder),
    };

    // -- queue -------------------------------------------------------------
    let frames = ManualFrames::new();
    let scope = SchedulerScope::new(frames.clone());
    let queue = scope.queue();
    queue.set_trace_sink(tee);

    let totals = Rc::new(Cell::new(FlushSummary::default()));
    queue.set_flush_listener({
        let totals = Rc::clone(&totals);
        move |s| {
            let mut t = totals.get();
            t.slots_committed += s.slots_committed;
            t.updates_applied += s.updates_applied;
            t.slots_failed += s.slots_failed;
            t.slots_detached += s.slots_detached;
            totals.set(t);
        }
    });
    queue.set_error_listener(|slot, err| {
        println!("  ! slot {}: {err}", slot.index());
    });

    // -- slots -------------------------------------------------------------
    let rendered = Rc::new(RefCell::new(Vec::new()));
    let frames_for_view = frames.clone();
    let ((_, counter), (_, progress), (label_value, label)) = scope.provide(|| {
        let counter = bind::<i64>(0, {
            let rendered = Rc::clone(&rendered);
            move |v: &i64| rendered.borrow_mut().push(*v)
        })
        .expect("counter slot");
        let progress = bind::<u32>(
            0,
            ProgressBar {
                frames: frames_for_view,
            },
        )
        .expect("progress slot");
        let label = bind::<String>(Initial::lazy(|| "idle".to_owned()), NoView)
            .expect("label slot");
        (counter, progress, label)
    });
    println!("label starts as {label_value:?}");

    // -- simulated loop ----------------------------------------------------
    for frame_index in 0..FRAME_COUNT {
        // A burst: many submissions, one commit per slot.
        for _ in 0..4 {
            counter.update(|n| n + 1);
        }
        if frame_index % 10 == 9 {
            // Rejected transforms drop the whole burst for this slot.
            counter.try_update(|n| if n % 2 == 0 { Err("odd bursts only") } else { Ok(n) });
        }
        progress.update(|p| p + 1);
        if frame_index % 15 == 0 {
            label.set(format!("frame {frame_index}"));
        }

        frames.run_frame();
    }

    let totals = totals.get();
    println!(
        "counter={:?} label={:?} flushes={} commits={} updates={} failed={} detached={}",
        counter.current(),
        label.current(),
        scope.version(),
        totals.slots_committed,
        totals.updates_applied,
        totals.slots_failed,
        totals.slots_detached,
    );
    println!("counter views rendered {} values", rendered.borrow().len());

    // -- export Chrome trace -----------------------------------------------
    let path = "trace.json";
    let file = File::create(path).expect("failed to create trace.json");
    let mut writer = BufWriter::new(file);
    framebatch_debug::chrome::export(recorder.borrow().as_bytes(), timebase, &mut writer)
        .expect("failed to write Chrome trace");

    println!("Wrote {path} ({FRAME_COUNT} frames)");
}
