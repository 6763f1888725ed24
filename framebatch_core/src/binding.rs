// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The consumer-facing entry point.
//!
//! [`bind`] creates a slot in the ambient scope's queue and returns its
//! current value together with a [`Submitter`]. [`bind_in`] does the same for
//! an explicit queue.

use alloc::boxed::Box;
use core::fmt;

use crate::queue::CoalescingQueue;
use crate::slot::{Initial, Slot, ViewBinding};
use crate::update::{BoxError, Update};

/// Why a binding could not be created.
#[derive(Debug)]
pub enum BindError {
    /// No scope is entered and no global queue is installed.
    NoQueue,
    /// The lazy initializer failed.
    Initializer(BoxError),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoQueue => f.write_str("no scope entered and no global queue installed"),
            Self::Initializer(err) => write!(f, "initializer failed: {err}"),
        }
    }
}

impl core::error::Error for BindError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::NoQueue => None,
            Self::Initializer(err) => Some(err.as_ref()),
        }
    }
}

/// Submit handle returned by [`bind`] and [`bind_in`].
///
/// Clones refer to the same slot. The slot lives while any clone does.
pub struct Submitter<T> {
    slot: Slot<T>,
}

impl<T> Clone for Submitter<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: Clone + 'static> Submitter<T> {
    /// Queues an update. It is applied at the next flush.
    pub fn submit(&self, update: impl Into<Update<T>>) {
        self.slot.submit(update);
    }

    /// Queues a replacement value.
    pub fn set(&self, value: T) {
        self.slot.submit(Update::Replace(value));
    }

    /// Queues a transform of the value at that point of the next flush.
    pub fn update(&self, f: impl FnOnce(T) -> T + 'static) {
        self.slot.submit(Update::Transform(Box::new(f)));
    }

    /// Queues a transform that may reject the value. A rejection drops every
    /// update queued for this slot in the same frame.
    pub fn try_update<E>(&self, f: impl FnOnce(T) -> Result<T, E> + 'static)
    where
        E: Into<BoxError>,
    {
        self.slot.submit(Update::try_map(f));
    }

    /// Returns the last committed value.
    #[must_use]
    pub fn current(&self) -> Option<T> {
        self.slot.read()
    }
}

impl<T> Submitter<T> {
    /// Returns the underlying slot.
    #[must_use]
    pub fn slot(&self) -> &Slot<T> {
        &self.slot
    }
}

impl<T: fmt::Debug> fmt::Debug for Submitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Submitter").field(&self.slot).finish()
    }
}

/// Creates a slot in `queue`.
///
/// Returns the slot's value right after creation and its submit handle.
///
/// # Errors
///
/// Returns [`BindError::Initializer`] if a lazy initializer fails.
pub fn bind_in<T: Clone + 'static>(
    queue: &CoalescingQueue,
    initial: impl Into<Initial<T>>,
    view: impl ViewBinding<T> + 'static,
) -> Result<(Option<T>, Submitter<T>), BindError> {
    let slot = Slot::create(queue, initial, view).map_err(BindError::Initializer)?;
    Ok((slot.read(), Submitter { slot }))
}

/// Creates a slot in the queue of the innermost entered scope, or the global
/// queue outside any scope.
///
/// The core crate has no frame source of its own, so there is no global queue
/// until the host installs one with
/// [`install_global_queue`](crate::scope::install_global_queue). The web
/// backend's `install_global` does this with a `requestAnimationFrame` source.
///
/// # Errors
///
/// Returns [`BindError::NoQueue`] if there is no queue to register into, and
/// [`BindError::Initializer`] if a lazy initializer fails.
#[cfg(feature = "std")]
pub fn bind<T: Clone + 'static>(
    initial: impl Into<Initial<T>>,
    view: impl ViewBinding<T> + 'static,
) -> Result<(Option<T>, Submitter<T>), BindError> {
    let queue = crate::scope::resolve_queue().ok_or(BindError::NoQueue)?;
    bind_in(&queue, initial, view)
}
