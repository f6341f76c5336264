//! Cotick: a cooperative task-coroutine runtime for tick-driven
//! interactive applications.
//!
//! # Overview
//!
//! Cotick provides suspendable, composable, reference-counted tasks built
//! on stackless coroutines (Rust `async` blocks polled once per tick), with
//! strong rules about who may resume a task, when it is destroyed, and how
//! cancellation propagates. The typical consumer is a game-actor model: a
//! host loop calls [`TaskManager::update`] once per frame and every live
//! task advances to its next suspension point.
//!
//! # Core rules
//!
//! - **Single resumer**: every live task has exactly one resumable handle
//!   ([`Task`] or [`WeakTask`]); both are move-only, so the rule holds
//!   structurally. Dropping the resumable handle kills the task.
//! - **Kill on last strong reference**: a task whose logical strong count
//!   reaches zero is killed immediately, destroying its coroutine frame and
//!   running the destructors of its locals ([`guard::ScopeGuard`] makes
//!   that a cleanup guarantee).
//! - **Cooperative stop**: [`Task::request_stop`] sets a flag that fans out
//!   to registered stop-targets and sub-tasks; bodies observe it via
//!   [`task::StopContext`] and wind down at their convenience. Kill is the
//!   non-cooperative fallback.
//! - **Single-threaded cooperative**: no preemption, no locks; everything
//!   runs on the thread driving the updates.
//!
//! # Module structure
//!
//! - [`task`]: the task machine (handles, the body context, awaiters).
//! - [`combinator`]: any/all/select, predicate waits, time-stream waits,
//!   cancel/stop wrappers.
//! - [`manager`]: the ordered scheduler.
//! - [`fsm`]: state machines whose states are task factories.
//! - [`token`]: weakly-tracked shared state.
//! - [`guard`]: scope guards.
//! - [`sync`]: promise/future pair for host-to-task handoff.
//! - [`time`]: time-stream conventions and the optional global source.
//!
//! # Example
//!
//! ```
//! use cotick::{Task, TaskManager};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let hits = Rc::new(Cell::new(0));
//! let hits_in_task = hits.clone();
//!
//! let mut mgr = TaskManager::new();
//! let _h = mgr.run(Task::new(move |cx| async move {
//!     for _ in 0..3 {
//!         hits_in_task.set(hits_in_task.get() + 1);
//!         cx.suspend().await;
//!     }
//! }));
//!
//! for _ in 0..5 {
//!     mgr.update();
//! }
//! assert_eq!(hits.get(), 3);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

pub mod combinator;
pub mod error;
pub mod fsm;
pub mod guard;
pub mod manager;
pub mod sync;
pub mod task;
pub mod time;
pub mod token;
pub mod tracing_compat;
pub mod types;

pub use combinator::{
    delay_call, select, timeout, wait_for_all, wait_for_any, wait_forever, wait_seconds,
    wait_until, wait_while, Entry, SelectEntry,
};
pub use error::{PanicPayload, PromiseDropped};
pub use fsm::{StateId, TaskFsm};
pub use guard::ScopeGuard;
pub use manager::TaskManager;
pub use task::{
    DebugStackFormat, DebugStackFormatter, StopContext, Task, TaskCtx, TaskHandle, WeakTask,
    WeakTaskHandle,
};
pub use time::TaskTime;
pub use types::{TaskId, TaskStatus};
