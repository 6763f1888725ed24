// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Folding a slot's pending operations into one value.
//!
//! The flush seeds the fold with the slot's last committed value. A slot that
//! has never held a value seeds with `None`; a transform reached while the
//! accumulator is still `None` has nothing to transform and fails the batch
//! with [`ReduceError::Unset`]. A replacement anywhere earlier in the batch
//! makes later transforms well-defined, so `[Replace(1), Transform(+1)]` on an
//! empty slot yields `2`.

use core::fmt;

use crate::update::{BoxError, Update};

/// Why a slot's batch could not be reduced.
#[derive(Debug)]
pub enum ReduceError {
    /// A transform was reached with no value to transform.
    Unset {
        /// Position of the transform within the batch.
        index: usize,
    },
    /// A fallible transform rejected its input.
    Rejected {
        /// Position of the transform within the batch.
        index: usize,
        /// The transform's error.
        source: BoxError,
    },
}

impl ReduceError {
    /// Position of the failing operation within the batch.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Unset { index } | Self::Rejected { index, .. } => *index,
        }
    }
}

impl fmt::Display for ReduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset { index } => write!(f, "update {index} transforms a slot with no value"),
            Self::Rejected { index, source } => write!(f, "update {index} rejected: {source}"),
        }
    }
}

impl core::error::Error for ReduceError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Unset { .. } => None,
            Self::Rejected { source, .. } => Some(source.as_ref()),
        }
    }
}

/// Folds `ops` left to right starting from `seed`.
///
/// Returns `Ok(seed)` unchanged when `ops` is empty.
///
/// # Errors
///
/// Returns the first [`ReduceError`] hit; the remaining operations are
/// dropped without running.
pub fn reduce<T, I>(seed: Option<T>, ops: I) -> Result<Option<T>, ReduceError>
where
    I: IntoIterator<Item = Update<T>>,
{
    ops.into_iter()
        .enumerate()
        .try_fold(seed, |acc, (index, op)| match op {
            Update::Replace(value) => Ok(Some(value)),
            Update::Transform(f) => acc.map(f).map(Some).ok_or(ReduceError::Unset { index }),
            Update::TryTransform(f) => {
                let value = acc.ok_or(ReduceError::Unset { index })?;
                f(value)
                    .map(Some)
                    .map_err(|source| ReduceError::Rejected { index, source })
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::Cell;

    #[test]
    fn mixed_batch_matches_sequential_application() {
        let ops = vec![
            Update::replace(1),
            Update::map(|x: i32| x + 1),
            Update::replace(5),
            Update::map(|x: i32| x * 2),
        ];
        assert_eq!(reduce(Some(100), ops).unwrap(), Some(10));
    }

    #[test]
    fn seed_feeds_leading_transform() {
        let ops = vec![
            Update::map(|x: i32| x + 1),
            Update::replace(10),
            Update::map(|x: i32| x - 2),
        ];
        assert_eq!(reduce(Some(0), ops).unwrap(), Some(8));
    }

    #[test]
    fn empty_batch_returns_seed() {
        assert_eq!(reduce(Some(3), Vec::<Update<i32>>::new()).unwrap(), Some(3));
        assert_eq!(reduce(None, Vec::<Update<i32>>::new()).unwrap(), None);
    }

    #[test]
    fn leading_transform_on_unset_seed_fails() {
        let ops = vec![Update::map(|x: i32| x + 1), Update::replace(4)];
        let err = reduce(None, ops).unwrap_err();
        assert!(matches!(err, ReduceError::Unset { index: 0 }), "got {err:?}");
    }

    #[test]
    fn replacement_before_transform_defines_unset_seed() {
        let ops = vec![Update::replace(1), Update::map(|x: i32| x + 1)];
        assert_eq!(reduce(None, ops).unwrap(), Some(2));
    }

    #[test]
    fn rejection_stops_the_fold() {
        let later = Rc::new(Cell::new(false));
        let flag = Rc::clone(&later);
        let ops = vec![
            Update::replace(2),
            Update::try_map(|x: i32| if x > 1 { Err("too big") } else { Ok(x) }),
            Update::map(move |x| {
                flag.set(true);
                x
            }),
        ];
        let err = reduce(None, ops).unwrap_err();
        assert_eq!(err.index(), 1);
        assert!(err.to_string().contains("too big"), "got {err}");
        assert!(!later.get(), "operations after a rejection must not run");
    }
}
