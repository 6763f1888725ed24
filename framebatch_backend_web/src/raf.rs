// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `requestAnimationFrame` frame source.
//!
//! [`RafRequester`] implements [`FrameRequester`] with the browser's
//! `requestAnimationFrame`. Each callback receives a
//! [`DOMHighResTimeStamp`][mdn] (milliseconds from `performance.now()`),
//! which is converted to microsecond [`HostTime`] ticks.
//!
//! [mdn]: https://developer.mozilla.org/en-US/docs/Web/API/DOMHighResTimeStamp

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

use framebatch_core::frame::{FrameCallback, FrameRequester, FrameToken};
use framebatch_core::time::HostTime;

// Direct global bindings instead of `web_sys::Window` methods: avoids
// fetching (and unwrapping) the Window/Performance objects on every frame.
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = performance, js_name = "now")]
    pub(crate) fn performance_now() -> f64;

    #[wasm_bindgen(js_name = "requestAnimationFrame")]
    fn request_animation_frame(callback: &JsValue) -> i32;

    #[wasm_bindgen(js_name = "cancelAnimationFrame")]
    fn cancel_animation_frame(id: i32);
}

/// Converts a `DOMHighResTimeStamp` (ms) to µs ticks.
pub(crate) fn host_time_from_ms(timestamp_ms: f64) -> HostTime {
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "rAF timestamp is a small positive f64; µs fits in u64"
    )]
    let us = (timestamp_ms * 1000.0) as u64;
    HostTime(us)
}

type RafClosure = Closure<dyn FnMut(f64)>;

struct Pending {
    token: FrameToken,
    raf_id: i32,
    closure: RafClosure,
}

#[derive(Default)]
struct RafInner {
    next_token: Cell<u64>,
    /// Registered closures that have not fired yet.
    pending: RefCell<Vec<Pending>>,
    /// The closure that fired last. A JS closure must not be dropped while it
    /// runs, so it is parked here until the next one fires.
    retired: RefCell<Option<RafClosure>>,
}

impl RafInner {
    fn retire(&self, token: FrameToken) {
        let fired = {
            let mut pending = self.pending.borrow_mut();
            pending
                .iter()
                .position(|p| p.token == token)
                .map(|pos| pending.remove(pos))
        };
        if let Some(fired) = fired {
            let stale = self.retired.borrow_mut().replace(fired.closure);
            drop(stale);
        }
    }
}

impl Drop for RafInner {
    fn drop(&mut self) {
        for pending in self.pending.get_mut().drain(..) {
            cancel_animation_frame(pending.raf_id);
        }
    }
}

/// A [`FrameRequester`] backed by `requestAnimationFrame`.
///
/// Clones share state. Dropping the last clone cancels every outstanding
/// request.
#[derive(Clone, Default)]
pub struct RafRequester {
    inner: Rc<RafInner>,
}

impl RafRequester {
    /// Creates a requester with nothing outstanding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of requests that have not fired yet.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }
}

impl FrameRequester for RafRequester {
    fn request_frame(&self, callback: FrameCallback) -> FrameToken {
        let token = FrameToken(self.inner.next_token.get());
        self.inner.next_token.set(token.0 + 1);

        let inner = Rc::downgrade(&self.inner);
        let mut callback = Some(callback);
        let closure = Closure::wrap(Box::new(move |timestamp_ms: f64| {
            let Some(callback) = callback.take() else {
                return;
            };
            if let Some(inner) = inner.upgrade() {
                inner.retire(token);
            }
            callback(host_time_from_ms(timestamp_ms));
        }) as Box<dyn FnMut(f64)>);

        let raf_id = request_animation_frame(closure.as_ref().unchecked_ref());
        self.inner.pending.borrow_mut().push(Pending {
            token,
            raf_id,
            closure,
        });
        token
    }

    fn cancel_frame(&self, token: FrameToken) {
        let cancelled = {
            let mut pending = self.inner.pending.borrow_mut();
            pending
                .iter()
                .position(|p| p.token == token)
                .map(|pos| pending.remove(pos))
        };
        if let Some(cancelled) = cancelled {
            cancel_animation_frame(cancelled.raf_id);
        }
    }
}

impl core::fmt::Debug for RafRequester {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RafRequester")
            .field("pending", &self.pending_count())
            .field("next_token", &self.inner.next_token.get())
            .finish_non_exhaustive()
    }
}
