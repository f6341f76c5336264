//! Error types and error-handling strategy.
//!
//! The runtime distinguishes three failure classes:
//!
//! - **Invariant violations** (resume while resuming, kill during a resume,
//!   double-take of a return value): programmer bugs. These panic with a
//!   stable message and are never caught by the runtime.
//! - **Task-body panics**: caught at the poll boundary and stored on the
//!   internal task as a [`PanicPayload`]. They surface only through explicit
//!   observation; they never cross the sub-task link implicitly.
//! - **Recoverable conditions** ([`PromiseDropped`]): ordinary typed errors.

use core::fmt;
use std::any::Any;
use std::panic::resume_unwind;

/// A captured panic from a task body.
///
/// Produced when a task's coroutine frame panics during a resume. The
/// payload is whatever the panic carried; [`PanicPayload::message`] extracts
/// the conventional `&str`/`String` forms.
pub struct PanicPayload {
    payload: Box<dyn Any + Send + 'static>,
}

impl PanicPayload {
    /// Wraps a raw panic payload.
    #[must_use]
    pub fn new(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self { payload }
    }

    /// Returns the panic message when the payload is a string type.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.payload
            .downcast_ref::<&'static str>()
            .copied()
            .or_else(|| self.payload.downcast_ref::<String>().map(String::as_str))
    }

    /// Returns the raw payload.
    #[must_use]
    pub fn into_inner(self) -> Box<dyn Any + Send + 'static> {
        self.payload
    }

    /// Continues unwinding with the stored payload.
    pub fn resume(self) -> ! {
        resume_unwind(self.payload)
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "PanicPayload({msg:?})"),
            None => write!(f, "PanicPayload(<non-string payload>)"),
        }
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "task panicked: {msg}"),
            None => write!(f, "task panicked with a non-string payload"),
        }
    }
}

/// Error produced when awaiting a [`TaskFuture`](crate::sync::TaskFuture)
/// whose [`Promise`](crate::sync::Promise) was dropped unfulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("promise was dropped without producing a value")]
pub struct PromiseDropped;
