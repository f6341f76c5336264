//! Entries for the group combinators.

use crate::task::Task;

/// One entry of a [`wait_for_any`](super::wait_for_any) or
/// [`wait_for_all`](super::wait_for_all) set: any task (its return value is
/// discarded) or a ready predicate.
pub struct Entry {
    pub(crate) task: Task<()>,
}

impl Entry {
    /// Wraps a task.
    pub fn task<T: 'static>(task: Task<T>) -> Self {
        Self {
            task: task.into_unit(),
        }
    }

    /// Wraps a ready predicate; the entry completes once it returns true.
    pub fn until<F>(pred: F) -> Self
    where
        F: FnMut() -> bool + 'static,
    {
        Self {
            task: super::wait_until(pred),
        }
    }
}

impl<T: 'static> From<Task<T>> for Entry {
    fn from(task: Task<T>) -> Self {
        Self::task(task)
    }
}

/// One entry of a [`select`](super::select) set: an [`Entry`] plus the
/// value yielded if this entry finishes first.
pub struct SelectEntry<V> {
    pub(crate) value: V,
    pub(crate) task: Task<()>,
}

impl<V> SelectEntry<V> {
    /// Associates `value` with a task.
    pub fn task<T: 'static>(value: V, task: Task<T>) -> Self {
        Self {
            value,
            task: task.into_unit(),
        }
    }

    /// Associates `value` with a ready predicate.
    pub fn until<F>(value: V, pred: F) -> Self
    where
        F: FnMut() -> bool + 'static,
    {
        Self {
            value,
            task: super::wait_until(pred),
        }
    }
}
