// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pending update operations.

use alloc::boxed::Box;
use core::fmt;

/// Error payload of fallible initializers and transforms.
pub type BoxError = Box<dyn core::error::Error>;

/// One queued operation against a slot.
///
/// Operations for a slot are folded in submission order by
/// [`reduce`](crate::reduce::reduce).
pub enum Update<T> {
    /// Replace the value outright.
    Replace(T),
    /// Compute the next value from the value at that point of the fold.
    Transform(Box<dyn FnOnce(T) -> T>),
    /// Like [`Transform`](Self::Transform), but may reject the value. A
    /// rejection drops the slot's whole batch for the current flush.
    TryTransform(Box<dyn FnOnce(T) -> Result<T, BoxError>>),
}

impl<T> Update<T> {
    /// Creates a replacement.
    #[must_use]
    pub fn replace(value: T) -> Self {
        Self::Replace(value)
    }

    /// Creates an infallible transform.
    #[must_use]
    pub fn map(f: impl FnOnce(T) -> T + 'static) -> Self {
        Self::Transform(Box::new(f))
    }

    /// Creates a fallible transform.
    #[must_use]
    pub fn try_map<E>(f: impl FnOnce(T) -> Result<T, E> + 'static) -> Self
    where
        E: Into<BoxError>,
    {
        Self::TryTransform(Box::new(move |value| -> Result<T, BoxError> {
            f(value).map_err(Into::into)
        }))
    }

    /// Returns `true` if applying this operation needs a previous value.
    #[must_use]
    pub fn is_transform(&self) -> bool {
        !matches!(self, Self::Replace(_))
    }
}

impl<T> From<T> for Update<T> {
    fn from(value: T) -> Self {
        Self::Replace(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Update<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(value) => f.debug_tuple("Replace").field(value).finish(),
            Self::Transform(_) => f.write_str("Transform(..)"),
            Self::TryTransform(_) => f.write_str("TryTransform(..)"),
        }
    }
}
