// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Web backend for framebatch.
//!
//! This crate provides integration with browser APIs:
//!
//! - [`RafRequester`]: `requestAnimationFrame` frame source
//! - [`TextView`]: DOM text binding for slots
//! - [`install_global`] and [`scope`]: queues driven by the browser's refresh

#![no_std]

extern crate alloc;

mod raf;
mod view;

pub use raf::RafRequester;
pub use view::TextView;

use framebatch_core::queue::{CoalescingQueue, QueueConfig};
use framebatch_core::scope::{SchedulerScope, install_global_queue};
use framebatch_core::time::{HostTime, Timebase};

/// Returns the current host time from `performance.now()`.
///
/// The returned [`HostTime`] is in microsecond ticks. Use [`timebase`] to
/// convert to nanoseconds.
#[must_use]
pub fn now() -> HostTime {
    raf::host_time_from_ms(raf::performance_now())
}

/// Returns the web [`Timebase`]: 1 tick = 1 µs = 1000 ns.
#[must_use]
pub fn timebase() -> Timebase {
    Timebase::MICROS
}

/// Installs a global queue flushed on animation frames.
///
/// Returns the new queue; the one it replaced, if any, is dropped.
pub fn install_global() -> CoalescingQueue {
    let queue = CoalescingQueue::with_config(QueueConfig::global(), RafRequester::new());
    drop(install_global_queue(queue.clone()));
    queue
}

/// Creates a scope whose queue is flushed on animation frames.
#[must_use]
pub fn scope() -> SchedulerScope {
    SchedulerScope::new(RafRequester::new())
}
