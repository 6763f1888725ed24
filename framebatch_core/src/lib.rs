// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-coalescing state updates.
//!
//! `framebatch_core` turns many small, rapid updates against logical state
//! slots into a single applied update per slot per rendering frame. Consumers
//! submit replacements and transforms as fast as they like; the queue folds
//! each slot's submissions in order and commits the result once, when the
//! host's display-refresh callback fires. Intermediate values are never
//! rendered, and the final value is exactly what sequential application would
//! have produced.
//!
//! The crate is `no_std` compatible (with `alloc`) and single-threaded: all
//! types are `!Send` and share state through `Rc`.
//!
//! # Architecture
//!
//! ```text
//!   bind / bind_in ──► Slot ──submit──► CoalescingQueue ──request_frame──► FrameRequester
//!                                              │                                │
//!                                              │ ◄──────── callback(now) ───────┘
//!                                              ▼
//!                           reduce(committed, batch) ──► Slot::commit ──► ViewBinding
//! ```
//!
//! **[`slot`]**: A slot's value, identity and view binding.
//!
//! **[`update`]**: Replacements and (fallible) transforms.
//!
//! **[`reduce`]**: The pure fold of a slot's batch onto its committed value.
//!
//! **[`queue`]**: [`CoalescingQueue`](queue::CoalescingQueue) with its
//! per-slot batches, frame requests and the flush.
//!
//! **[`scope`]**: [`SchedulerScope`](scope::SchedulerScope) and the ambient
//! scope stack that decides which queue a new slot registers into.
//!
//! **[`binding`]**: [`bind`](binding::bind) and
//! [`bind_in`](binding::bind_in), returning `(current value, Submitter)`.
//!
//! **[`frame`]**: The [`FrameRequester`](frame::FrameRequester) contract hosts
//! implement, and the headless [`ManualFrames`](frame::ManualFrames).
//!
//! **[`dirty`]**: Pending-slot tracking via `understory_dirty`.
//!
//! **[`time`]**: Host timestamps.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! flush instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Example
//!
//! ```rust
//! use framebatch_core::binding::bind;
//! use framebatch_core::frame::ManualFrames;
//! use framebatch_core::scope::SchedulerScope;
//! use framebatch_core::slot::NoView;
//!
//! let frames = ManualFrames::new();
//! let scope = SchedulerScope::new(frames.clone());
//! let (_, counter) = scope.provide(|| bind::<i32>(0, NoView)).unwrap();
//!
//! counter.update(|x| x + 1);
//! counter.set(10);
//! counter.update(|x| x - 2);
//! assert_eq!(counter.current(), Some(0));
//!
//! frames.run_frame();
//! assert_eq!(counter.current(), Some(8));
//! ```
//!
//! # Crate features
//!
//! - `std` (enabled by default): Ambient scope stack, the global queue, and
//!   [`bind`](binding::bind).
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-submission
//!   events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod binding;
pub mod dirty;
pub mod frame;
pub mod queue;
pub mod reduce;
pub mod scope;
pub mod slot;
pub mod time;
pub mod trace;
pub mod update;
