//! Awaiter futures.
//!
//! Every awaiter models the same suspend contract: a readiness check, an
//! on-suspend action (install a readiness gate or a sub-task link on the
//! enclosing task), and a resume value. The enclosing task's resume
//! protocol guarantees an awaiter is only re-polled after its gate opened,
//! so each future here records whether it suspended and completes
//! unconditionally on the next poll.

use crate::error::PromiseDropped;
use crate::sync::TaskFuture;
use crate::task::handle::Task;
use crate::task::raw::{RawTask, ReadyFn};
use crate::types::TaskStatus;
use std::future::Future;
use std::pin::Pin;
use std::rc::Weak;
use std::task::{Context, Poll};

/// Unconditionally yields control once.
#[must_use = "futures do nothing unless awaited"]
pub struct Suspend {
    yielded: bool,
}

impl Suspend {
    pub(crate) fn new() -> Self {
        Self { yielded: false }
    }
}

impl Future for Suspend {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            Poll::Pending
        }
    }
}

/// Yields control once if `suspend` is true, otherwise completes
/// immediately.
#[must_use = "futures do nothing unless awaited"]
pub struct SuspendIf {
    suspend: bool,
}

impl SuspendIf {
    /// Creates the awaiter.
    pub fn new(suspend: bool) -> Self {
        Self { suspend }
    }
}

impl Future for SuspendIf {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.suspend {
            self.suspend = false;
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }
}

/// Predicate wait: suspends with the predicate installed as the enclosing
/// task's readiness gate.
#[must_use = "futures do nothing unless awaited"]
pub struct WaitUntil {
    raw: Weak<RawTask>,
    pred: Option<ReadyFn>,
    installed: bool,
}

impl WaitUntil {
    pub(crate) fn new(raw: Weak<RawTask>, pred: ReadyFn) -> Self {
        Self {
            raw,
            pred: Some(pred),
            installed: false,
        }
    }
}

impl Future for WaitUntil {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.installed {
            // The gate opened; that is the only way we get re-polled.
            return Poll::Ready(());
        }
        let mut pred = self
            .pred
            .take()
            .expect("predicate awaiter polled after completion");
        if pred() {
            return Poll::Ready(());
        }
        match self.raw.upgrade() {
            Some(raw) => {
                raw.set_ready_fn(pred);
                self.installed = true;
                Poll::Pending
            }
            // Task is gone; nothing will ever gate us, so finish.
            None => Poll::Ready(()),
        }
    }
}

/// Task wait with sub-task adoption.
///
/// On first poll: done targets complete immediately; otherwise the target
/// becomes the enclosing task's sub-task, inherits any pending stop
/// request, and is resumed once on the spot (it may finish within this same
/// resume).
#[must_use = "futures do nothing unless awaited"]
pub struct WaitTask<T> {
    parent: Weak<RawTask>,
    task: Option<Task<T>>,
    adopted: bool,
}

impl<T: 'static> WaitTask<T> {
    pub(crate) fn new(parent: Weak<RawTask>, task: Task<T>) -> Self {
        Self {
            parent,
            task: Some(task),
            adopted: false,
        }
    }

    fn finish(task: &Task<T>) -> Option<T> {
        // Failures do not cross the sub-task link implicitly.
        if task.has_panicked() {
            None
        } else {
            task.take_return_value()
        }
    }
}

impl<T: 'static> Future for WaitTask<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.adopted {
            let task = this
                .task
                .take()
                .expect("task awaiter polled after completion");
            return Poll::Ready(Self::finish(&task));
        }

        let task = this
            .task
            .as_mut()
            .expect("task awaiter polled after completion");
        if !task.is_done() {
            if let Some(parent) = this.parent.upgrade() {
                if parent.is_stop_requested() {
                    task.request_stop();
                }
                let child = task
                    .raw()
                    .expect("awaited task has no internal record")
                    .clone();
                parent.set_sub_task(child);
                if task.resume() == TaskStatus::Suspended {
                    this.adopted = true;
                    return Poll::Pending;
                }
                parent.clear_sub_task();
            } else if task.resume() == TaskStatus::Suspended {
                // No enclosing task to adopt into; plain polling.
                return Poll::Pending;
            }
        }

        let task = this.task.take().expect("task awaiter lost its task");
        Poll::Ready(Self::finish(&task))
    }
}

/// Future wait: polls a [`TaskFuture`] non-blockingly via the readiness
/// gate, then yields its value.
#[must_use = "futures do nothing unless awaited"]
pub struct WaitFuture<T> {
    until: WaitUntil,
    future: TaskFuture<T>,
}

impl<T: 'static> WaitFuture<T> {
    pub(crate) fn new(raw: Weak<RawTask>, future: TaskFuture<T>) -> Self {
        let probe = future.clone_ref();
        Self {
            until: WaitUntil::new(raw, Box::new(move || probe.is_settled())),
            future,
        }
    }
}

impl<T: 'static> Future for WaitFuture<T> {
    type Output = Result<T, PromiseDropped>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.until).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(()) => Poll::Ready(
                self.future
                    .try_take()
                    .expect("future gate opened while unsettled"),
            ),
        }
    }
}
