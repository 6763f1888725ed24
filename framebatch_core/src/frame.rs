// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display-refresh callback contract.
//!
//! A queue never drives itself. It asks a [`FrameRequester`] for exactly one
//! callback at a time, and the host invokes that callback once, before the
//! next frame is drawn. Backends implement the trait on top of a platform
//! primitive (`requestAnimationFrame` in `framebatch_backend_web`);
//! [`ManualFrames`] is the headless implementation used by tests, demos and
//! hosts that run their own frame loop.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::time::{Duration, HostTime};

/// One-shot callback handed to a [`FrameRequester`].
///
/// The argument is the host time of the frame the callback runs in.
pub type FrameCallback = Box<dyn FnOnce(HostTime)>;

/// Identifies an outstanding frame request so it can be cancelled.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

impl fmt::Debug for FrameToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameToken({})", self.0)
    }
}

/// Host primitive that runs a callback once, asynchronously, before the next
/// frame.
///
/// Methods take `&self`: the requester is shared with the queue and may be
/// called again from inside a callback it is currently running, so
/// implementations keep their state behind `Cell`/`RefCell`.
pub trait FrameRequester {
    /// Schedules `callback` for the next frame and returns a token for it.
    fn request_frame(&self, callback: FrameCallback) -> FrameToken;

    /// Cancels a request that has not fired yet. Cancelling a token that
    /// already fired (or was never issued) is a no-op.
    fn cancel_frame(&self, token: FrameToken);
}

/// Nominal refresh interval of [`ManualFrames`]: ≈60 Hz in nanosecond ticks.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration(16_666_667);

/// A [`FrameRequester`] whose frames are run explicitly with
/// [`run_frame`](Self::run_frame).
///
/// Clones share state, so a host can hand one clone to a queue and keep
/// another to pump frames:
///
/// ```rust
/// use framebatch_core::frame::ManualFrames;
/// use framebatch_core::queue::CoalescingQueue;
///
/// let frames = ManualFrames::new();
/// let queue = CoalescingQueue::new(frames.clone());
/// // ... submit updates ...
/// frames.run_frame();
/// # drop(queue);
/// ```
#[derive(Clone)]
pub struct ManualFrames {
    inner: Rc<ManualInner>,
}

#[derive(Default)]
struct ManualInner {
    next_token: Cell<u64>,
    pending: RefCell<Vec<(FrameToken, FrameCallback)>>,
    frames_run: Cell<u64>,
    now: Cell<HostTime>,
    interval: Cell<Duration>,
}

impl ManualFrames {
    /// Creates a frame source starting at time zero with
    /// [`DEFAULT_FRAME_INTERVAL`] between frames.
    #[must_use]
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_FRAME_INTERVAL)
    }

    /// Creates a frame source that advances time by `interval` per frame.
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            inner: Rc::new(ManualInner {
                interval: Cell::new(interval),
                ..ManualInner::default()
            }),
        }
    }

    /// Runs one frame.
    ///
    /// Every callback requested before this call fires, in request order, with
    /// the current frame time. Callbacks requested while the frame runs are
    /// kept for the next frame. Returns the number of callbacks fired.
    pub fn run_frame(&self) -> usize {
        let now = self.inner.now.get();
        let due = core::mem::take(&mut *self.inner.pending.borrow_mut());
        let fired = due.len();
        for (_, callback) in due {
            callback(now);
        }
        self.inner.frames_run.set(self.inner.frames_run.get() + 1);
        self.inner
            .now
            .set(now.saturating_add(self.inner.interval.get()));
        fired
    }

    /// Runs frames until no callback is pending or `max_frames` frames ran.
    ///
    /// Returns the number of frames run.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut ran = 0;
        while ran < max_frames && self.pending_count() > 0 {
            self.run_frame();
            ran += 1;
        }
        ran
    }

    /// Returns the number of callbacks waiting for the next frame.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Returns the number of frames run so far.
    #[must_use]
    pub fn frames_run(&self) -> u64 {
        self.inner.frames_run.get()
    }

    /// Returns the time the next frame will report.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.inner.now.get()
    }
}

impl Default for ManualFrames {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRequester for ManualFrames {
    fn request_frame(&self, callback: FrameCallback) -> FrameToken {
        let token = FrameToken(self.inner.next_token.get());
        self.inner.next_token.set(token.0 + 1);
        self.inner.pending.borrow_mut().push((token, callback));
        token
    }

    fn cancel_frame(&self, token: FrameToken) {
        // Dropping the callback outside the borrow: it may own handles whose
        // destructors call back into this source.
        let cancelled = {
            let mut pending = self.inner.pending.borrow_mut();
            pending
                .iter()
                .position(|(t, _)| *t == token)
                .map(|pos| pending.remove(pos))
        };
        drop(cancelled);
    }
}

impl fmt::Debug for ManualFrames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualFrames")
            .field("pending", &self.pending_count())
            .field("frames_run", &self.inner.frames_run.get())
            .field("now", &self.inner.now.get())
            .finish()
    }
}
