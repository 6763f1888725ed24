// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Boundary to the view-binding layer.

use core::fmt;

/// Returned by a [`ViewBinding`] whose host-side consumer was torn down.
///
/// Reported by the flush, never fatal: the value is still committed to the
/// slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewDetached;

impl fmt::Display for ViewDetached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("view binding was torn down")
    }
}

impl core::error::Error for ViewDetached {}

/// Receives every value committed to a slot so the host can re-render.
///
/// Implemented for `FnMut(&T)` closures, which never report detachment.
pub trait ViewBinding<T> {
    /// Called once per flush that commits a new value to the slot.
    ///
    /// # Errors
    ///
    /// Returns [`ViewDetached`] if the consumer no longer exists.
    fn value_committed(&mut self, value: &T) -> Result<(), ViewDetached>;
}

impl<T, F: FnMut(&T)> ViewBinding<T> for F {
    fn value_committed(&mut self, value: &T) -> Result<(), ViewDetached> {
        self(value);
        Ok(())
    }
}

/// A [`ViewBinding`] that ignores commits, for slots read by polling.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoView;

impl<T> ViewBinding<T> for NoView {
    fn value_committed(&mut self, _value: &T) -> Result<(), ViewDetached> {
        Ok(())
    }
}
