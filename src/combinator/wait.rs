//! Predicate and time-stream waits.

use crate::task::Task;
use crate::time::{elapsed_since, TaskTime};

/// Waits until `pred` returns true.
pub fn wait_until<F>(pred: F) -> Task<()>
where
    F: FnMut() -> bool + 'static,
{
    Task::new(move |cx| async move {
        cx.set_debug_name("WaitUntil");
        cx.until(pred).await;
    })
}

/// Waits while `pred` returns true.
pub fn wait_while<F>(mut pred: F) -> Task<()>
where
    F: FnMut() -> bool + 'static,
{
    Task::new(move |cx| async move {
        cx.set_debug_name("WaitWhile");
        cx.until(move || !pred()).await;
    })
}

/// Waits forever. Only useful in tasks that will be killed or stopped
/// externally.
pub fn wait_forever() -> Task<()> {
    Task::new(move |cx| async move {
        cx.set_debug_name("WaitForever");
        cx.until(|| false).await;
    })
}

/// Waits `seconds` in the given time-stream; yields the overshoot (how far
/// past the requested duration the completing tick landed).
pub fn wait_seconds<F>(seconds: TaskTime, time_fn: F) -> Task<TaskTime>
where
    F: Fn() -> TaskTime + Clone + 'static,
{
    Task::new(move |cx| async move {
        let start = time_fn();
        cx.set_debug_name("WaitSeconds");
        #[cfg(feature = "task-debug")]
        {
            let time_fn = time_fn.clone();
            cx.set_debug_data(move || {
                format!("{:.2}/{:.2}", elapsed_since(start, &time_fn), seconds)
            });
        }
        let timer = time_fn.clone();
        cx.until(move || elapsed_since(start, &timer) >= seconds).await;
        time_fn() - start - seconds
    })
}

/// Calls `f` after `seconds` in the given time-stream.
pub fn delay_call<C, F>(seconds: TaskTime, f: C, time_fn: F) -> Task<()>
where
    C: FnOnce() + 'static,
    F: Fn() -> TaskTime + Clone + 'static,
{
    Task::new(move |cx| async move {
        cx.set_debug_name("DelayCall");
        let _ = cx.wait(wait_seconds(seconds, time_fn)).await;
        f();
    })
}

/// [`wait_seconds`] in the global time-stream.
#[cfg(feature = "global-time")]
pub fn wait_seconds_global(seconds: TaskTime) -> Task<TaskTime> {
    wait_seconds(seconds, crate::time::global_time_fn())
}

/// [`delay_call`] in the global time-stream.
#[cfg(feature = "global-time")]
pub fn delay_call_global<C>(seconds: TaskTime, f: C) -> Task<()>
where
    C: FnOnce() + 'static,
{
    delay_call(seconds, f, crate::time::global_time_fn())
}
