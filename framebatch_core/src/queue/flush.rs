// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-frame flush.

use alloc::vec::Vec;

use super::batch::BatchOutcome;
use super::{CoalescingQueue, FrameState, saturating_u32};
use crate::reduce::ReduceError;
use crate::slot::SlotId;
use crate::time::HostTime;
use crate::trace::{
    FailureKind, FlushBeginEvent, FlushSummary, FlushSummaryBuilder, SlotCommitEvent,
    SlotFailureEvent,
};

impl CoalescingQueue {
    /// Folds and commits every pending batch.
    ///
    /// The queue is reset (idle, empty) before the first commit runs, so
    /// anything submitted from a commit lands in a fresh batch and schedules
    /// another frame.
    pub(crate) fn flush(&self, now: HostTime) {
        let (flush_index, batches) = {
            let mut state = self.shared.state.borrow_mut();
            state.frame = FrameState::Idle;
            let flush_index = state.flushes;
            state.flushes += 1;
            (flush_index, state.table.take_pending())
        };

        let begin = FlushBeginEvent {
            queue: self.id(),
            flush_index,
            now,
            pending_slots: saturating_u32(batches.len()),
        };
        self.trace(|t| t.flush_begin(&begin));

        let mut summary = FlushSummaryBuilder::new(&begin);
        let mut errors: Vec<(SlotId, ReduceError)> = Vec::new();
        for (slot, batch) in batches {
            let batch_len = saturating_u32(batch.len());
            let failure = |kind, update_index| SlotFailureEvent {
                queue: begin.queue,
                flush_index,
                slot,
                kind,
                update_index,
                batch_len,
            };
            let commit = SlotCommitEvent {
                queue: begin.queue,
                flush_index,
                slot,
                coalesced: batch_len,
            };
            match batch.apply() {
                BatchOutcome::Committed => {
                    summary.committed(batch_len);
                    self.trace(|t| t.slot_commit(&commit));
                }
                BatchOutcome::Detached => {
                    summary.committed(batch_len);
                    summary.failed(FailureKind::Detached);
                    self.trace(|t| {
                        t.slot_commit(&commit);
                        t.slot_failure(&failure(FailureKind::Detached, None));
                    });
                }
                BatchOutcome::Failed(err) => {
                    let kind = FailureKind::from(&err);
                    summary.failed(kind);
                    let index = saturating_u32(err.index());
                    self.trace(|t| t.slot_failure(&failure(kind, Some(index))));
                    errors.push((slot, err));
                }
                BatchOutcome::Dropped => {
                    summary.failed(FailureKind::Dropped);
                    self.trace(|t| t.slot_failure(&failure(FailureKind::Dropped, None)));
                }
            }
        }

        let summary = summary.finish(saturating_u32(self.pending_slots()));
        self.shared.state.borrow_mut().completed += 1;
        self.trace(|t| t.flush_summary(&summary));
        self.report_errors(errors);
        self.notify_flushed(&summary);
    }

    fn report_errors(&self, errors: Vec<(SlotId, ReduceError)>) {
        if errors.is_empty() {
            return;
        }
        let taken = self.shared.error_listener.borrow_mut().take();
        let Some(mut listener) = taken else {
            return;
        };
        for (slot, err) in &errors {
            listener(*slot, err);
        }
        let mut current = self.shared.error_listener.borrow_mut();
        if current.is_none() {
            *current = Some(listener);
        }
    }

    fn notify_flushed(&self, summary: &FlushSummary) {
        let taken = self.shared.flush_listener.borrow_mut().take();
        let Some(mut listener) = taken else {
            return;
        };
        listener(summary);
        // Keep a listener installed by the callback itself.
        let mut current = self.shared.flush_listener.borrow_mut();
        if current.is_none() {
            *current = Some(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::{String, ToString};
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};

    use crate::frame::ManualFrames;
    use crate::queue::CoalescingQueue;
    use crate::slot::{Initial, NoView, Slot, ViewBinding, ViewDetached};
    use crate::trace::FlushSummary;
    use crate::update::Update;

    fn setup() -> (ManualFrames, CoalescingQueue) {
        let frames = ManualFrames::new();
        let queue = CoalescingQueue::new(frames.clone());
        (frames, queue)
    }

    fn logged_slot(
        queue: &CoalescingQueue,
        initial: impl Into<Initial<i32>>,
    ) -> (Slot<i32>, Rc<RefCell<Vec<i32>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let slot = Slot::create(queue, initial, move |v: &i32| sink.borrow_mut().push(*v)).unwrap();
        (slot, log)
    }

    fn last_summary(queue: &CoalescingQueue) -> Rc<Cell<Option<FlushSummary>>> {
        let last = Rc::new(Cell::new(None));
        let out = Rc::clone(&last);
        queue.set_flush_listener(move |s| out.set(Some(*s)));
        last
    }

    #[test]
    fn burst_coalesces_into_one_commit() {
        let (frames, queue) = setup();
        let (slot, log) = logged_slot(&queue, 0);
        for i in 1..=10 {
            slot.submit(i);
        }
        assert_eq!(slot.read(), Some(0), "nothing commits before the frame");
        assert!(log.borrow().is_empty());

        frames.run_frame();
        assert_eq!(*log.borrow(), vec![10]);
        assert_eq!(slot.commit_count(), 1);
        assert_eq!(queue.flush_count(), 1);
        assert!(!queue.has_scheduled_flush());
    }

    #[test]
    fn mixed_updates_fold_in_submission_order() {
        let (frames, queue) = setup();
        let (slot, log) = logged_slot(&queue, 0);
        slot.submit(Update::map(|x: i32| x + 1));
        slot.submit(10);
        slot.submit(Update::map(|x: i32| x - 2));
        frames.run_frame();
        assert_eq!(*log.borrow(), vec![8]);
    }

    #[test]
    fn transform_seeds_from_committed_value() {
        let (frames, queue) = setup();
        let (slot, _log) = logged_slot(&queue, 5);
        slot.submit(Update::map(|x: i32| x * 3));
        frames.run_frame();
        assert_eq!(slot.read(), Some(15));

        slot.submit(Update::map(|x: i32| x + 1));
        slot.submit(Update::map(|x: i32| x + 1));
        frames.run_frame();
        assert_eq!(slot.read(), Some(17));
    }

    #[test]
    fn slots_are_independent() {
        let (frames, queue) = setup();
        let (a, a_log) = logged_slot(&queue, 0);
        let (b, b_log) = logged_slot(&queue, 100);
        let (idle, idle_log) = logged_slot(&queue, 7);
        a.submit(1);
        b.submit(Update::map(|x: i32| x + 1));
        a.submit(2);
        frames.run_frame();
        assert_eq!(*a_log.borrow(), vec![2]);
        assert_eq!(*b_log.borrow(), vec![101]);
        assert!(idle_log.borrow().is_empty(), "untouched slot must not commit");
        assert_eq!(idle.commit_count(), 0);
    }

    #[test]
    fn submissions_from_commits_wait_for_next_frame() {
        let (frames, queue) = setup();
        let (target, target_log) = logged_slot(&queue, 0);
        let echo = target.clone();
        let trigger = Slot::<i32>::create(&queue, 0, move |v: &i32| echo.submit(*v * 10)).unwrap();

        trigger.submit(3);
        frames.run_frame();
        assert!(target_log.borrow().is_empty(), "running flush must not see it");
        assert!(queue.has_scheduled_flush());
        assert_eq!(queue.pending_slots(), 1);

        frames.run_frame();
        assert_eq!(*target_log.borrow(), vec![30]);
        assert!(!queue.has_scheduled_flush());
    }

    #[test]
    fn commit_may_resubmit_to_its_own_slot() {
        let (frames, queue) = setup();
        let handle: Rc<RefCell<Option<Slot<i32>>>> = Rc::new(RefCell::new(None));
        let inner = Rc::clone(&handle);
        let slot = Slot::<i32>::create(&queue, 0, move |v: &i32| {
            if *v < 3
                && let Some(slot) = inner.borrow().as_ref()
            {
                slot.submit(Update::map(|x: i32| x + 1));
            }
        })
        .unwrap();
        *handle.borrow_mut() = Some(slot.clone());

        slot.submit(1);
        frames.run_until_idle(10);
        assert_eq!(slot.read(), Some(3));
        assert_eq!(queue.flush_count(), 3);
        handle.borrow_mut().take();
    }

    #[test]
    fn empty_flush_is_a_no_op() {
        let (_frames, queue) = setup();
        let (slot, log) = logged_slot(&queue, 4);
        let last = last_summary(&queue);
        queue.flush(crate::time::HostTime(0));
        let summary = last.get().unwrap();
        assert_eq!(summary.slots_committed, 0);
        assert_eq!(summary.slots_failed, 0);
        assert!(log.borrow().is_empty());
        assert_eq!(slot.read(), Some(4));
    }

    #[test]
    fn failing_slot_does_not_affect_others() {
        let (frames, queue) = setup();
        let (good, good_log) = logged_slot(&queue, 1);
        let (bad, bad_log) = logged_slot(&queue, 1);
        let errors = Rc::new(RefCell::new(Vec::<String>::new()));
        let seen = Rc::clone(&errors);
        queue.set_error_listener(move |_, err| seen.borrow_mut().push(err.to_string()));
        let last = last_summary(&queue);

        good.submit(Update::map(|x: i32| x + 1));
        bad.submit(Update::try_map(|_: i32| Err::<i32, _>("overflow")));
        bad.submit(9);
        frames.run_frame();

        assert_eq!(*good_log.borrow(), vec![2]);
        assert!(bad_log.borrow().is_empty());
        assert_eq!(bad.read(), Some(1), "failed batch is dropped, not partially applied");
        assert_eq!(errors.borrow().len(), 1);
        assert!(errors.borrow()[0].contains("overflow"));

        let summary = last.get().unwrap();
        assert_eq!(summary.slots_committed, 1);
        assert_eq!(summary.slots_failed, 1);

        // Not retried: the next frame has nothing to do for the failed slot.
        assert!(!queue.has_scheduled_flush());
    }

    #[test]
    fn transform_on_empty_slot_fails_until_replaced() {
        let (frames, queue) = setup();
        let (slot, log) = logged_slot(&queue, Initial::Empty);
        slot.submit(Update::map(|x: i32| x + 1));
        frames.run_frame();
        assert_eq!(slot.read(), None);

        slot.submit(1);
        slot.submit(Update::map(|x: i32| x + 1));
        frames.run_frame();
        assert_eq!(*log.borrow(), vec![2]);
    }

    #[test]
    fn slot_dropped_during_flush_is_skipped() {
        let (frames, queue) = setup();
        let victim: Rc<RefCell<Option<Slot<i32>>>> = Rc::new(RefCell::new(None));
        let killer_handle = Rc::clone(&victim);
        // Slot index 0 commits first and drops the slot at index 1.
        let killer = Slot::<i32>::create(&queue, 0, move |_: &i32| {
            killer_handle.borrow_mut().take();
        })
        .unwrap();
        let doomed = Slot::<i32>::create(&queue, 0, NoView).unwrap();
        let doomed_id = doomed.id();
        killer.submit(1);
        doomed.submit(5);
        *victim.borrow_mut() = Some(doomed);
        let last = last_summary(&queue);

        frames.run_frame();
        let summary = last.get().unwrap();
        assert_eq!(summary.slots_committed, 1);
        assert_eq!(summary.slots_dropped, 1);
        assert_eq!(queue.live_slots(), 1);

        let reused = Slot::<i32>::create(&queue, 0, NoView).unwrap();
        assert_eq!(reused.id().index(), doomed_id.index());
        assert_ne!(reused.id(), doomed_id);
    }

    #[test]
    fn detached_view_still_stores_value() {
        struct Gone;
        impl ViewBinding<i32> for Gone {
            fn value_committed(&mut self, _value: &i32) -> Result<(), ViewDetached> {
                Err(ViewDetached)
            }
        }

        let (frames, queue) = setup();
        let slot = Slot::<i32>::create(&queue, 0, Gone).unwrap();
        let last = last_summary(&queue);
        slot.submit(6);
        frames.run_frame();
        assert_eq!(slot.read(), Some(6));
        let summary = last.get().unwrap();
        assert_eq!(summary.slots_committed, 1);
        assert_eq!(summary.slots_detached, 1);
    }

    #[test]
    fn summary_counts_deferred_work() {
        let (frames, queue) = setup();
        let (target, _log) = logged_slot(&queue, 0);
        let echo = target.clone();
        let trigger = Slot::<i32>::create(&queue, 0, move |v: &i32| echo.submit(*v)).unwrap();
        let last = last_summary(&queue);

        trigger.submit(1);
        trigger.submit(2);
        frames.run_frame();
        let summary = last.get().unwrap();
        assert_eq!(summary.flush_index, 0);
        assert_eq!(summary.updates_applied, 2);
        assert_eq!(summary.deferred_slots, 1);
    }

    #[test]
    fn listener_sees_committed_values() {
        let (frames, queue) = setup();
        let (slot, _log) = logged_slot(&queue, 0);
        let seen = Rc::new(Cell::new(None));
        let out = Rc::clone(&seen);
        let reader = slot.clone();
        queue.set_flush_listener(move |_| out.set(reader.read()));
        slot.submit(42);
        frames.run_frame();
        assert_eq!(seen.get(), Some(Some(42)));
    }

    #[test]
    fn flush_counts_once_its_commits_have_run() {
        let (frames, queue) = setup();
        let during = Rc::new(Cell::new(None));
        let view_queue = queue.clone();
        let out = Rc::clone(&during);
        let slot = Slot::<i32>::create(&queue, 0, move |_: &i32| {
            out.set(Some(view_queue.flush_count()));
        })
        .unwrap();
        let after = Rc::new(Cell::new(None));
        let listener_queue = queue.clone();
        let out = Rc::clone(&after);
        queue.set_flush_listener(move |_| out.set(Some(listener_queue.flush_count())));

        slot.submit(1);
        frames.run_frame();
        assert_eq!(during.get(), Some(0), "commits run before the flush counts");
        assert_eq!(after.get(), Some(1), "the listener sees the finished flush");
        assert_eq!(queue.flush_count(), 1);
    }

    #[test]
    fn synchronous_host_flushes_inside_request() {
        use crate::frame::{FrameCallback, FrameRequester, FrameToken};
        use crate::time::HostTime;

        struct Immediate;
        impl FrameRequester for Immediate {
            fn request_frame(&self, callback: FrameCallback) -> FrameToken {
                callback(HostTime(0));
                FrameToken(0)
            }

            fn cancel_frame(&self, _token: FrameToken) {}
        }

        let queue = CoalescingQueue::new(Immediate);
        let (slot, log) = logged_slot(&queue, 0);
        slot.submit(1);
        slot.submit(2);
        assert_eq!(*log.borrow(), vec![1, 2]);
        assert!(!queue.has_scheduled_flush());
        assert_eq!(queue.flush_count(), 2);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn trace_events_follow_flush() {
        use crate::trace::{
            FailureKind, FlushBeginEvent, FrameRequestEvent, SlotCommitEvent, SlotFailureEvent,
            TraceSink,
        };

        #[derive(Default)]
        struct Log(Vec<String>);
        impl TraceSink for Log {
            fn on_frame_request(&mut self, e: &FrameRequestEvent) {
                self.0.push(alloc::format!("request {}", e.flush_index));
            }
            fn on_flush_begin(&mut self, e: &FlushBeginEvent) {
                self.0.push(alloc::format!("begin {}", e.pending_slots));
            }
            fn on_slot_commit(&mut self, e: &SlotCommitEvent) {
                self.0.push(alloc::format!("commit {}", e.coalesced));
            }
            fn on_slot_failure(&mut self, e: &SlotFailureEvent) {
                assert_eq!(e.kind, FailureKind::Unset);
                self.0.push(alloc::format!("fail {:?}", e.update_index));
            }
            fn on_flush_summary(&mut self, s: &FlushSummary) {
                self.0.push(alloc::format!("summary {}", s.slots_committed));
            }
        }

        let (frames, queue) = setup();
        let log = Rc::new(RefCell::new(Log::default()));
        queue.set_trace_sink(Rc::clone(&log));
        let (a, _) = logged_slot(&queue, 0);
        let (b, _) = logged_slot(&queue, Initial::Empty);
        a.submit(1);
        a.submit(2);
        b.submit(Update::map(|x: i32| x));
        frames.run_frame();

        assert_eq!(
            log.borrow().0,
            vec![
                "request 0",
                "begin 2",
                "commit 2",
                "fail Some(0)",
                "summary 1"
            ]
        );
    }
}
