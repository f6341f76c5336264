//! Identifier types for runtime entities.
//!
//! Task ids are allocated from a thread-local counter. They exist for
//! logging and debug output; the runtime never dereferences them.

use core::fmt;
use std::cell::Cell;

thread_local! {
    static NEXT_TASK_ID: Cell<u64> = const { Cell::new(1) };
}

/// A unique identifier for a task.
///
/// Ids are unique within the driving thread for the lifetime of the
/// process. They are never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocates the next task id.
    #[must_use]
    pub(crate) fn next() -> Self {
        NEXT_TASK_ID.with(|c| {
            let id = c.get();
            c.set(id + 1);
            Self(id)
        })
    }

    /// Returns the raw numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}
