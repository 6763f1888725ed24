// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! A queue records which slots received submissions since the last flush with
//! [`understory_dirty`], keyed by slot table index. Slots never depend on one
//! another, so marks are local-only and nothing propagates: the drain yields
//! exactly the slots that were marked, in deterministic index order.
//!
//! Releasing a slot removes its key, so a slot dropped between submission and
//! flush never reaches the drain.

use understory_dirty::Channel;

/// Slot has at least one pending update.
pub const PENDING: Channel = Channel::new(0);
