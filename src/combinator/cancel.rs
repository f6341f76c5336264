//! Cancel and stop wrappers.
//!
//! Two escalation strategies around a wrapped task:
//!
//! - **Cancel**: kill it outright the first time the condition holds.
//! - **Stop**: issue a cooperative stop request and keep resuming the task
//!   until it ends on its own, optionally hard-cancelling after a timeout.
//!
//! Both wrappers yield `Some(value)` when the wrapped task finished
//! normally and `None` when it was canceled.

use crate::task::{Task, TaskCtx};
use crate::time::{elapsed_since, TaskTime};
use crate::types::TaskStatus;
use std::rc::Rc;

pub(crate) type CancelFn = Box<dyn FnMut() -> bool>;
pub(crate) type TimeFnRc = Rc<dyn Fn() -> TaskTime>;

pub(crate) fn cancel_task_if<T: 'static>(task: Task<T>, mut cancel_fn: CancelFn) -> Task<Option<T>> {
    Task::new(move |cx| async move {
        cx.set_debug_name("CancelIf");
        install_wrapped_debug(&cx, &task);
        cx.add_stop_target(&task);
        let mut task = task;
        loop {
            if cancel_fn() {
                return None;
            }
            if task.resume() == TaskStatus::Done {
                return task.take_return_value();
            }
            cx.suspend().await;
        }
    })
}

pub(crate) fn stop_task_if<T: 'static>(
    task: Task<T>,
    mut stop_fn: CancelFn,
    timeout: Option<(TaskTime, TimeFnRc)>,
) -> Task<Option<T>> {
    Task::new(move |cx| async move {
        cx.set_debug_name("StopIf");
        install_wrapped_debug(&cx, &task);
        cx.add_stop_target(&task);
        let mut task = task;
        let mut timeout = timeout;
        loop {
            if !task.is_stop_requested() && stop_fn() {
                task.request_stop();
                if let Some((seconds, time_fn)) = timeout.take() {
                    // Escalate: give the stopped task `seconds` to wind
                    // down, then hard-cancel it.
                    let timer = move || time_fn();
                    let result = cx.wait(self::timeout(task, seconds, timer)).await;
                    return result.flatten();
                }
            }
            if task.resume() == TaskStatus::Done {
                return task.take_return_value();
            }
            cx.suspend().await;
        }
    })
}

/// Wraps `task`, cancelling it once `seconds` have elapsed in `time_fn`'s
/// stream. Yields `Some(value)` if the task beat the timer, `None` if it
/// timed out.
pub fn timeout<T, F>(task: Task<T>, seconds: TaskTime, time_fn: F) -> Task<Option<T>>
where
    T: 'static,
    F: Fn() -> TaskTime + Clone + 'static,
{
    let start = time_fn();
    task.cancel_if(move || elapsed_since(start, &time_fn) >= seconds)
}

/// [`timeout`] in the global time-stream.
#[cfg(feature = "global-time")]
pub fn timeout_global<T: 'static>(task: Task<T>, seconds: TaskTime) -> Task<Option<T>> {
    timeout(task, seconds, crate::time::global_time_fn())
}

#[cfg(feature = "task-debug")]
fn install_wrapped_debug<T: 'static>(cx: &TaskCtx, task: &Task<T>) {
    let handle = task.downgrade();
    cx.set_debug_data(move || handle.debug_stack(None));
}

#[cfg(not(feature = "task-debug"))]
fn install_wrapped_debug<T: 'static>(_cx: &TaskCtx, _task: &Task<T>) {}
