//! The task scheduler.
//!
//! A [`TaskManager`] holds an ordered list of root tasks and resumes each of
//! them once per [`update`](TaskManager::update). The host calls `update` on
//! whatever cadence it wishes (typically once per frame); the manager makes
//! no assumption about wall-clock rate.
//!
//! # Running tasks
//!
//! [`run`](TaskManager::run) takes ownership of a task and returns a strong
//! [`TaskHandle`]: the manager itself only keeps a weak resumable reference,
//! so the returned handle is the task's lifeline: drop it and the task is
//! killed. [`run_managed`](TaskManager::run_managed) additionally retains a
//! strong reference inside the manager, making the task fire-and-forget: it
//! lives until it finishes or something kills it explicitly.
//!
//! # Ordering
//!
//! Update order is stable. Within one update, tasks are resumed in the
//! order they were run; a task that survives keeps its position relative to
//! other survivors, and newly run tasks go to the end.

use crate::task::raw::RawTask;
use crate::task::{DebugStackFormat, Task, TaskCtx, TaskHandle, WeakTask, WeakTaskHandle};
use crate::tracing_compat::trace;
use crate::types::TaskStatus;
use std::rc::Rc;

/// Type-erased strong retention entry for managed tasks.
///
/// Semantically a unit `TaskHandle`: it pins the task's strong count and
/// observes its done flag, nothing more.
struct StrongRef {
    raw: Rc<RawTask>,
}

impl StrongRef {
    fn new(raw: Rc<RawTask>) -> Self {
        raw.add_strong_ref();
        Self { raw }
    }

    fn is_done(&self) -> bool {
        self.raw.is_done()
    }
}

impl Drop for StrongRef {
    fn drop(&mut self) {
        self.raw.remove_strong_ref();
    }
}

/// Manager that runs and resumes a collection of tasks.
#[derive(Default)]
pub struct TaskManager {
    tasks: Vec<WeakTask>,
    strong_refs: Vec<StrongRef>,
}

impl TaskManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs an unmanaged task.
    ///
    /// The returned handle holds the only strong reference; if it (and
    /// every handle cloned from it) is dropped, the task is killed
    /// immediately and its manager entry expires.
    #[must_use = "dropping the returned handle kills the task"]
    pub fn run<T: 'static>(&mut self, task: Task<T>) -> TaskHandle<T> {
        let handle = task.handle();
        self.run_weak(task.into_weak());
        handle
    }

    /// Runs a managed, fire-and-forget task.
    ///
    /// The manager retains a strong reference until the task finishes, so
    /// the returned weak handle is for observation (and explicit kill) only.
    pub fn run_managed<T: 'static>(&mut self, task: Task<T>) -> WeakTaskHandle {
        let weak_handle = task.downgrade();
        let handle = self.run(task);
        self.strong_refs.push(StrongRef::new(handle.raw_rc()));
        weak_handle
    }

    /// Runs a pre-existing weak resumable reference.
    ///
    /// The caller is assumed to hold a strong handle elsewhere; when the
    /// last strong reference goes away the task is killed and removed on
    /// the next update.
    pub fn run_weak(&mut self, task: WeakTask) {
        self.tasks.push(task);
    }

    /// Kills every task, managed and unmanaged.
    pub fn kill_all(&mut self) {
        trace!(count = self.tasks.len(), "killing all tasks");
        // Dropping the weak resumable handles kills the tasks; the strong
        // refs only ever point at tasks in the list just cleared.
        self.tasks.clear();
        self.strong_refs.clear();
    }

    /// Issues a stop request on every live task and returns a fence task
    /// that completes once all of them have terminated.
    pub fn stop_all(&mut self) -> Task<()> {
        let mut observers: Vec<WeakTaskHandle> = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            task.request_stop();
            observers.push(task.observer());
        }
        Task::new(move |cx: TaskCtx| async move {
            cx.set_debug_name("StopAllTasks fence");
            for observer in observers {
                cx.wait_done(&observer).await;
            }
        })
    }

    /// Resumes every task once, in order.
    ///
    /// Tasks whose resume reports done are removed; survivors keep their
    /// relative order. Afterwards, retained strong references to finished
    /// managed tasks are pruned.
    pub fn update(&mut self) {
        self.tasks
            .retain_mut(|task| task.resume() == TaskStatus::Suspended);
        self.strong_refs.retain(|r| !r.is_done());
    }

    /// The number of scheduled tasks (live and not-yet-pruned).
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns whether no tasks are scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Joins the debug stacks of all unfinished tasks with newlines.
    #[must_use]
    pub fn get_debug_string(&self, formatter: Option<&dyn DebugStackFormat>) -> String {
        let mut out = String::new();
        for task in &self.tasks {
            if !task.is_done() {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&task.debug_stack(formatter));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_task(counter: Rc<Cell<u32>>, ticks: u32) -> Task<()> {
        Task::new(move |cx| async move {
            for _ in 0..ticks {
                counter.set(counter.get() + 1);
                cx.suspend().await;
            }
        })
    }

    #[test]
    fn run_returns_lifeline_handle() {
        let mut mgr = TaskManager::new();
        let counter = Rc::new(Cell::new(0));
        let handle = mgr.run(counting_task(counter.clone(), 3));
        mgr.update();
        assert_eq!(counter.get(), 1);
        drop(handle);
        // Last strong ref gone: the task was killed on the spot.
        mgr.update();
        assert_eq!(counter.get(), 1);
        assert!(mgr.is_empty());
    }

    #[test]
    fn run_managed_outlives_its_weak_handle() {
        let mut mgr = TaskManager::new();
        let counter = Rc::new(Cell::new(0));
        let weak = mgr.run_managed(counting_task(counter.clone(), 2));
        drop(weak);
        mgr.update();
        mgr.update();
        mgr.update();
        assert_eq!(counter.get(), 2);
        assert!(mgr.is_empty());
    }

    #[test]
    fn kill_all_destroys_everything() {
        let mut mgr = TaskManager::new();
        let counter = Rc::new(Cell::new(0));
        let _weak = mgr.run_managed(counting_task(counter.clone(), 100));
        mgr.update();
        mgr.kill_all();
        mgr.update();
        assert_eq!(counter.get(), 1);
        assert!(mgr.is_empty());
    }

    #[test]
    fn update_preserves_insertion_order() {
        let mut mgr = TaskManager::new();
        let log: Rc<std::cell::RefCell<Vec<u8>>> = Rc::default();
        let make = |tag: u8, ticks: u32| {
            let log = log.clone();
            Task::new(move |cx| async move {
                for _ in 0..ticks {
                    log.borrow_mut().push(tag);
                    cx.suspend().await;
                }
            })
        };
        let _a = mgr.run_managed(make(b'a', 1));
        let _b = mgr.run_managed(make(b'b', 3));
        let _c = mgr.run_managed(make(b'c', 3));
        mgr.update(); // a b c
        mgr.update(); // b c   (a finished, survivors keep order)
        mgr.update(); // b c
        assert_eq!(&*log.borrow(), b"abcbcbc");
    }
}
