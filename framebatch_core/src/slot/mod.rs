// Copyright 2026 the Framebatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! State slots.
//!
//! A *slot* is one logical piece of state. Each slot has:
//!
//! - An identity ([`SlotId`]) allocated by the queue the slot registered
//!   into when it was created. The slot routes every submission to that
//!   queue for its whole lifetime.
//! - A current value, `None` until something is committed unless the slot
//!   was created with an [`Initial`] value.
//! - A [`ViewBinding`] notified after every commit.
//!
//! Slots are reference counted. The queue only keeps weak references, so a
//! slot lives as long as some consumer holds a [`Slot`] (or a
//! [`Submitter`](crate::binding::Submitter)) for it. Dropping the last handle
//! releases the identity and discards any updates still pending for it.

mod id;
mod view;

pub use id::{QueueId, SlotId};
pub use view::{NoView, ViewBinding, ViewDetached};

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::queue::{CoalescingQueue, QueueShared};
use crate::update::{BoxError, Update};

/// How a slot gets its first value.
pub enum Initial<T> {
    /// No value until the first flush commits one.
    Empty,
    /// A concrete value.
    Value(T),
    /// An initializer run exactly once, while the slot is created.
    Lazy(Box<dyn FnOnce() -> Result<T, BoxError>>),
}

impl<T> Initial<T> {
    /// Wraps an infallible initializer.
    #[must_use]
    pub fn lazy(f: impl FnOnce() -> T + 'static) -> Self {
        Self::Lazy(Box::new(move || Ok(f())))
    }

    /// Wraps a fallible initializer. Its error is returned by slot creation.
    #[must_use]
    pub fn try_lazy<E>(f: impl FnOnce() -> Result<T, E> + 'static) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Lazy(Box::new(move || -> Result<T, BoxError> {
            f().map_err(Into::into)
        }))
    }

    fn resolve(self) -> Result<Option<T>, BoxError> {
        match self {
            Self::Empty => Ok(None),
            Self::Value(value) => Ok(Some(value)),
            Self::Lazy(init) => init().map(Some),
        }
    }
}

impl<T> Default for Initial<T> {
    fn default() -> Self {
        Self::Empty
    }
}

impl<T> From<T> for Initial<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Initial<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

pub(crate) struct SlotInner<T> {
    pub(crate) id: SlotId,
    queue_id: QueueId,
    queue: Weak<QueueShared>,
    value: RefCell<Option<T>>,
    view: RefCell<Box<dyn ViewBinding<T>>>,
    commits: Cell<u64>,
}

impl<T: Clone> SlotInner<T> {
    pub(crate) fn read(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    /// Stores `value`, then tells the view about it.
    ///
    /// The view sees the new value if it reads the slot while being notified.
    pub(crate) fn commit(&self, value: T) -> Result<(), ViewDetached> {
        let notified = value.clone();
        *self.value.borrow_mut() = Some(value);
        self.commits.set(self.commits.get() + 1);
        self.view.borrow_mut().value_committed(&notified)
    }
}

impl<T> Drop for SlotInner<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.queue.upgrade() {
            CoalescingQueue::from_shared(shared).release(self.id);
        }
    }
}

/// Handle to a slot. Clones refer to the same slot.
pub struct Slot<T> {
    inner: Rc<SlotInner<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Slot<T> {
    /// Creates a slot registered into `queue`.
    ///
    /// A lazy initializer runs here, exactly once, and never again.
    ///
    /// # Errors
    ///
    /// Returns the initializer's error. No slot is created and no identity is
    /// allocated in that case.
    pub fn create(
        queue: &CoalescingQueue,
        initial: impl Into<Initial<T>>,
        view: impl ViewBinding<T> + 'static,
    ) -> Result<Self, BoxError> {
        let value = initial.into().resolve()?;
        let id = queue.register();
        Ok(Self {
            inner: Rc::new(SlotInner {
                id,
                queue_id: queue.id(),
                queue: queue.downgrade(),
                value: RefCell::new(value),
                view: RefCell::new(Box::new(view)),
                commits: Cell::new(0),
            }),
        })
    }

    /// Returns the last committed value. Never triggers a flush.
    #[must_use]
    pub fn read(&self) -> Option<T> {
        self.inner.read()
    }

    /// Queues `update` on the slot's queue.
    ///
    /// Updates for a slot whose queue no longer exists are discarded.
    pub fn submit(&self, update: impl Into<Update<T>>) {
        if let Some(shared) = self.inner.queue.upgrade() {
            CoalescingQueue::from_shared(shared).submit(&self.inner, update.into());
        }
    }
}

impl<T> Slot<T> {
    /// Runs `f` with a reference to the last committed value.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.value.borrow().as_ref())
    }

    /// Returns the slot's identity.
    #[must_use]
    pub fn id(&self) -> SlotId {
        self.inner.id
    }

    /// Returns the id of the queue this slot routes to.
    #[must_use]
    pub fn queue_id(&self) -> QueueId {
        self.inner.queue_id
    }

    /// Returns the queue this slot routes to, if it still exists.
    #[must_use]
    pub fn queue(&self) -> Option<CoalescingQueue> {
        self.inner.queue.upgrade().map(CoalescingQueue::from_shared)
    }

    /// Returns how many values have been committed to this slot.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.inner.commits.get()
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.inner.id)
            .field("queue", &self.inner.queue_id)
            .field("value", &self.inner.value.borrow())
            .field("commits", &self.inner.commits.get())
            .finish_non_exhaustive()
    }
}
