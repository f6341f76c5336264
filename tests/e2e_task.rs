//! End-to-end coverage of the task machine: the suspend/resume protocol,
//! handle lifetimes, return values, and stop propagation.

mod common;

use cotick::{Task, TaskStatus};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A task awaiting a counter predicate completes exactly on the update in
/// which the predicate first holds.
#[test]
fn suspend_resume_loop_completes_on_the_exact_update() {
    let counter = Rc::new(Cell::new(0u32));
    let mut task = {
        let counter = counter.clone();
        Task::new(move |cx| async move {
            cx.until(move || counter.get() >= 3).await;
        })
    };

    // Counter increments each tick from 0; done exactly on the third.
    counter.set(counter.get() + 1);
    assert_eq!(task.resume(), TaskStatus::Suspended);
    counter.set(counter.get() + 1);
    assert_eq!(task.resume(), TaskStatus::Suspended);
    counter.set(counter.get() + 1);
    assert_eq!(task.resume(), TaskStatus::Done);
}

#[test]
fn is_done_never_reverts() {
    let mut task = Task::new(|cx| async move {
        cx.suspend().await;
    });
    assert!(!task.is_done());
    task.resume();
    task.resume();
    assert!(task.is_done());
    task.resume();
    assert!(task.is_done());
    task.kill();
    assert!(task.is_done());
}

/// Dropping the last strong handle makes the task done and its return
/// value unavailable.
#[test]
fn last_strong_handle_drop_kills_and_orphans_value() {
    let task: Task<u32> = Task::new(|cx| async move {
        cx.until(|| false).await;
        42
    });
    let observer = task.downgrade();
    let handle = task.handle();
    drop(task); // resumable handle gone: killed already here
    assert!(observer.is_done());
    assert_eq!(handle.take_return_value(), None);
}

#[test]
fn return_value_round_trip_is_take_once() {
    let mut task = Task::new(|_cx| async move { "payload" });
    let handle = task.handle();
    assert_eq!(task.resume(), TaskStatus::Done);
    assert_eq!(handle.take_return_value(), Some("payload"));
    // A second take through any handle is a programmer bug; covered by
    // unit tests as a should_panic. Here: the value is observably gone
    // only through the panic path, so nothing further to assert.
}

#[test]
fn stop_request_fans_out_through_wrapper_chains() {
    let leaf_observed_stop = Rc::new(Cell::new(false));
    let leaf = {
        let observed = leaf_observed_stop.clone();
        Task::new(move |cx| async move {
            let stop = cx.stop_context();
            cx.until(move || stop.is_stop_requested()).await;
            observed.set(true);
        })
    };
    // Wrap: the stop request reaches the leaf through the sub-task chain.
    let mut wrapper = Task::new(move |cx| async move {
        let _ = cx.wait(leaf).await;
    });
    wrapper.resume();
    wrapper.request_stop();
    assert!(wrapper.is_stop_requested());
    // The leaf winds down cooperatively on the next update.
    assert_eq!(wrapper.resume(), TaskStatus::Done);
    assert!(leaf_observed_stop.get());
}

#[test]
fn stop_context_outlives_its_task_safely() {
    let ctx_cell: Rc<RefCell<Option<cotick::StopContext>>> = Rc::default();
    let probe = {
        let ctx_cell = ctx_cell.clone();
        Task::new(move |cx| async move {
            *ctx_cell.borrow_mut() = Some(cx.stop_context());
            cx.suspend().await;
        })
    };
    let mut probe = probe;
    probe.resume();
    let stop_ctx = ctx_cell.borrow_mut().take().unwrap();
    assert!(!stop_ctx.is_stop_requested());
    drop(probe);
    // Task gone: the context reports stop-requested rather than dangling.
    assert!(stop_ctx.is_stop_requested());
}

#[test]
fn wait_on_killed_child_yields_none() {
    let child: Task<u32> = Task::new(|cx| async move {
        cx.until(|| false).await;
        5
    });
    let killer = child.downgrade();
    let mut parent = Task::new(move |cx| async move { cx.wait(child).await });
    assert_eq!(parent.resume(), TaskStatus::Suspended);
    killer.kill();
    assert_eq!(parent.resume(), TaskStatus::Done);
    assert_eq!(parent.take_return_value(), Some(None));
}

#[test]
fn child_panic_does_not_unwind_the_parent() {
    let mut parent = Task::new(move |cx| async move {
        let child: Task<u32> = Task::new(|_cx| async move { panic!("child failed") });
        cx.wait(child).await
    });
    assert_eq!(parent.resume(), TaskStatus::Done);
    assert!(!parent.has_panicked());
    assert_eq!(parent.take_return_value(), Some(None));
}

#[test]
fn promise_future_handoff() {
    let (promise, future) = cotick::sync::promise::<u32>();
    let mut task = Task::new(move |cx| async move { cx.wait_future(future).await });
    assert_eq!(task.resume(), TaskStatus::Suspended);
    assert_eq!(task.resume(), TaskStatus::Suspended);
    promise.set(99);
    assert_eq!(task.resume(), TaskStatus::Done);
    assert_eq!(task.take_return_value(), Some(Ok(99)));
}

#[test]
fn broken_promise_surfaces_as_error() {
    let (promise, future) = cotick::sync::promise::<u32>();
    let mut task = Task::new(move |cx| async move { cx.wait_future(future).await });
    assert_eq!(task.resume(), TaskStatus::Suspended);
    drop(promise);
    assert_eq!(task.resume(), TaskStatus::Done);
    assert_eq!(task.take_return_value(), Some(Err(cotick::PromiseDropped)));
}

/// A scope guard acquired before an eternal await runs
/// exactly once when the task is killed.
#[test]
fn scope_guard_runs_on_kill() {
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::default();
    let mut task = {
        let log = log.clone();
        Task::new(move |cx| async move {
            let _out = cotick::ScopeGuard::new(move || log.borrow_mut().push("out"));
            cx.until(|| false).await;
        })
    };
    task.resume();
    assert!(log.borrow().is_empty());
    task.kill();
    assert_eq!(&*log.borrow(), &["out"]);
    task.kill();
    assert_eq!(&*log.borrow(), &["out"]);
}
