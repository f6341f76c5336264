//! The task body context.
//!
//! Rust futures have no channel back to the object that owns them, so every
//! task body receives a [`TaskCtx`] as its argument. All awaiter entry
//! points live here: the context knows which internal task to install ready
//! predicates and sub-task links on.
//!
//! A `TaskCtx` belongs to exactly one task. Moving it into a different
//! task's body and awaiting through it there is a logic error (the gates
//! would be installed on the wrong task).

use crate::sync::TaskFuture;
use crate::task::awaiter::{Suspend, WaitFuture, WaitTask, WaitUntil};
use crate::task::handle::{AsTaskRef, Task};
use crate::task::raw::RawTask;
use crate::types::TaskId;
use std::rc::Weak;

/// Read-only view of a task's stop flag.
///
/// Obtained from [`TaskCtx::stop_context`] and freely copyable into
/// predicates and other closures. Reports stop-requested once the
/// underlying task is gone.
#[derive(Clone)]
pub struct StopContext {
    raw: Weak<RawTask>,
}

impl StopContext {
    /// Returns whether a stop request has been issued for the task.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.raw.upgrade().is_none_or(|r| r.is_stop_requested())
    }
}

/// Awaiter entry points for a task body.
///
/// Cheap to clone; clones refer to the same task.
#[derive(Clone)]
pub struct TaskCtx {
    raw: Weak<RawTask>,
}

impl TaskCtx {
    pub(crate) fn new(raw: Weak<RawTask>) -> Self {
        Self { raw }
    }

    /// Unconditionally yields control for one tick.
    pub fn suspend(&self) -> Suspend {
        Suspend::new()
    }

    /// Suspends until `pred` returns true.
    ///
    /// If the predicate is already true, no suspension occurs. Otherwise it
    /// is installed as the task's readiness gate and evaluated once per
    /// resume.
    pub fn until<F>(&self, pred: F) -> WaitUntil
    where
        F: FnMut() -> bool + 'static,
    {
        WaitUntil::new(self.raw.clone(), Box::new(pred))
    }

    /// Awaits another task, adopting it as this task's sub-task.
    ///
    /// The sub-task is resumed as part of this task's resume chain and
    /// inherits stop requests. If the sub-task is already done, no
    /// suspension occurs. Yields `Some(value)` when the sub-task completed
    /// normally, `None` when it ended without a value (killed or panicked;
    /// failures do not propagate implicitly, observe them on a handle).
    pub fn wait<T: 'static>(&self, task: Task<T>) -> WaitTask<T> {
        WaitTask::new(self.raw.clone(), task)
    }

    /// Suspends until `handle`'s task is done, without adopting it.
    ///
    /// This is the observation-only wait: the target keeps being resumed by
    /// whoever owns it, and this task polls its done flag.
    pub fn wait_done<H: AsTaskRef>(&self, handle: &H) -> WaitUntil {
        let target = handle.as_task_ref().0.map(|raw| std::rc::Rc::downgrade(&raw));
        self.until(move || match &target {
            Some(weak) => weak.upgrade().is_none_or(|r| r.is_done()),
            None => true,
        })
    }

    /// Suspends until `future` is settled, polling it non-blockingly.
    ///
    /// Yields the promised value, or
    /// [`PromiseDropped`](crate::error::PromiseDropped) if the promise was
    /// dropped unfulfilled.
    pub fn wait_future<T: 'static>(&self, future: TaskFuture<T>) -> WaitFuture<T> {
        WaitFuture::new(self.raw.clone(), future)
    }

    /// Returns a read-only view of this task's stop flag. No suspension.
    #[must_use]
    pub fn stop_context(&self) -> StopContext {
        StopContext {
            raw: self.raw.clone(),
        }
    }

    /// Returns whether a stop request has been issued for this task.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.raw.upgrade().is_none_or(|r| r.is_stop_requested())
    }

    /// Registers `handle`'s task to receive this task's stop requests.
    ///
    /// If a stop was already requested, the target is stopped immediately.
    /// The registration is weak: it cannot keep the target alive or form a
    /// reference cycle.
    pub fn add_stop_target<H: AsTaskRef>(&self, handle: &H) {
        let Some(raw) = self.raw.upgrade() else { return };
        if let Some(target) = handle.as_task_ref().0 {
            raw.add_stop_target(&target);
        }
    }

    /// Deregisters `handle`'s task from this task's stop fan-out.
    pub fn remove_stop_target<H: AsTaskRef>(&self, handle: &H) {
        let Some(raw) = self.raw.upgrade() else { return };
        if let Some(target) = handle.as_task_ref().0 {
            raw.remove_stop_target(&target);
        }
    }

    /// This task's id.
    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        self.raw.upgrade().map(|r| r.id())
    }

    /// Stores a debug name on this task. No-op without the `task-debug`
    /// feature.
    pub fn set_debug_name(&self, name: &'static str) {
        #[cfg(feature = "task-debug")]
        if let Some(raw) = self.raw.upgrade() {
            raw.set_debug_name(name);
        }
        #[cfg(not(feature = "task-debug"))]
        let _ = name;
    }

    /// Stores a debug data producer on this task; its output is appended to
    /// the debug name while the task is live. No-op without the
    /// `task-debug` feature.
    pub fn set_debug_data<F>(&self, data_fn: F)
    where
        F: Fn() -> String + 'static,
    {
        #[cfg(feature = "task-debug")]
        if let Some(raw) = self.raw.upgrade() {
            raw.set_debug_data_fn(Box::new(data_fn));
        }
        #[cfg(not(feature = "task-debug"))]
        let _ = data_fn;
    }
}
