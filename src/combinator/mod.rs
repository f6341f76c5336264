//! Composite tasks built over the awaiter surface.
//!
//! Everything here is an ordinary library task:
//!
//! - [`wait_for_any`] / [`wait_for_all`] / [`select`]: drive a set of
//!   entries until one / all / the first completes.
//! - [`wait_until`] / [`wait_while`] / [`wait_forever`]: predicate waits.
//! - [`wait_seconds`] / [`timeout`] / [`delay_call`]: time-stream awaiters.
//! - The cancel/stop wrappers backing [`Task::cancel_if`](crate::Task::cancel_if)
//!   and [`Task::stop_if`](crate::Task::stop_if).
//!
//! Determinism: composite entries are resumed in insertion order, and
//! same-tick completion ties resolve by insertion order.

mod cancel;
mod entry;
mod group;
mod wait;

pub use cancel::timeout;
pub use entry::{Entry, SelectEntry};
pub use group::{select, wait_for_all, wait_for_any};
pub use wait::{delay_call, wait_forever, wait_seconds, wait_until, wait_while};

#[cfg(feature = "global-time")]
pub use cancel::timeout_global;
#[cfg(feature = "global-time")]
pub use wait::{delay_call_global, wait_seconds_global};

pub(crate) use cancel::{cancel_task_if, stop_task_if, TimeFnRc};
