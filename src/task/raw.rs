//! The internal task record.
//!
//! One `RawTask` exists per live coroutine frame. It owns the frame
//! exclusively and carries everything the resume protocol needs: the
//! done flag, the lifecycle state, the optional readiness predicate, the
//! sub-task chain link, the cooperative stop flag with its fan-out list,
//! the logical strong-handle count, and the captured panic slot.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──resume──▶ Resuming ──▶ Idle        (suspended again)
//!   │                  └──────▶ Destroyed   (frame completed or panicked)
//!   └──kill──▶ Destroyed
//! ```
//!
//! `Resuming` is a guard window: killing or re-resuming a task inside it is
//! a programmer bug and panics with a stable message.

use crate::error::PanicPayload;
use crate::guard::ScopeGuard;
use crate::tracing_compat::trace;
use crate::types::{TaskId, TaskStatus};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

/// Readiness predicate installed by a suspended awaiter.
pub(crate) type ReadyFn = Box<dyn FnMut() -> bool>;

type Frame = Pin<Box<dyn Future<Output = ()>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Resuming,
    Destroyed,
}

pub(crate) struct RawTask {
    id: TaskId,
    /// The coroutine frame. Exclusively owned; `None` once destroyed (and
    /// transiently while being polled).
    frame: RefCell<Option<Frame>>,
    state: Cell<RunState>,
    /// Monotonic false -> true.
    done: Cell<bool>,
    /// While present, `resume` is gated on this predicate returning true.
    ready_fn: RefCell<Option<ReadyFn>>,
    /// While present, resuming this task first resumes the sub-task and
    /// short-circuits unless it is done.
    sub_task: RefCell<Option<Rc<RawTask>>>,
    /// Monotonic false -> true.
    stop_requested: Cell<bool>,
    /// Weak so that registering a parent or sibling cannot form a cycle.
    stop_targets: RefCell<SmallVec<[Weak<RawTask>; 2]>>,
    /// Logical strong-handle count; the task is killed when it reaches zero.
    strong_count: Cell<u32>,
    panic: RefCell<Option<PanicPayload>>,
    #[cfg(feature = "task-debug")]
    debug_name: Cell<&'static str>,
    #[cfg(feature = "task-debug")]
    debug_data_fn: RefCell<Option<Box<dyn Fn() -> String>>>,
}

impl RawTask {
    /// Creates a record with no frame; the frame is installed by the handle
    /// constructor once the body future has been built around this record.
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            id: TaskId::next(),
            frame: RefCell::new(None),
            state: Cell::new(RunState::Idle),
            done: Cell::new(false),
            ready_fn: RefCell::new(None),
            sub_task: RefCell::new(None),
            stop_requested: Cell::new(false),
            stop_targets: RefCell::new(SmallVec::new()),
            strong_count: Cell::new(0),
            panic: RefCell::new(None),
            #[cfg(feature = "task-debug")]
            debug_name: Cell::new("[unnamed task]"),
            #[cfg(feature = "task-debug")]
            debug_data_fn: RefCell::new(None),
        })
    }

    pub(crate) fn install_frame(&self, frame: Frame) {
        *self.frame.borrow_mut() = Some(frame);
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.get()
    }

    pub(crate) fn is_stop_requested(&self) -> bool {
        self.stop_requested.get()
    }

    /// Steps the task once.
    ///
    /// Resumes the sub-task chain depth-first; the leaf's readiness gate
    /// controls whether the frame itself is polled. Returns `Done` once the
    /// frame has completed or been destroyed.
    ///
    /// # Panics
    ///
    /// Panics if the task is already inside a resume.
    pub(crate) fn resume(self: &Rc<Self>) -> TaskStatus {
        if self.state.get() == RunState::Destroyed {
            return TaskStatus::Done;
        }
        assert!(
            self.state.get() != RunState::Resuming,
            "attempted to resume a task that is already resuming"
        );
        self.state.set(RunState::Resuming);

        // Restores Idle on every exit, including an unwind out of a ready
        // predicate. Completion paths overwrite the state with Destroyed
        // before the guard observes it.
        let this = Rc::downgrade(self);
        let _restore = ScopeGuard::new(move || {
            if let Some(raw) = this.upgrade() {
                if raw.state.get() == RunState::Resuming {
                    raw.state.set(RunState::Idle);
                }
            }
        });

        let sub = self.sub_task.borrow().clone();
        if let Some(sub) = sub {
            // Flag-only propagation: the sub-task carries it further down
            // its own chain when it resumes.
            if self.stop_requested.get() {
                sub.stop_requested.set(true);
            }
            if sub.resume() == TaskStatus::Suspended {
                return TaskStatus::Suspended;
            }
            *self.sub_task.borrow_mut() = None;
        }

        if self.can_resume() {
            *self.ready_fn.borrow_mut() = None;
            let frame = self.frame.borrow_mut().take();
            if let Some(mut frame) = frame {
                let mut poll_cx = Context::from_waker(Waker::noop());
                match catch_unwind(AssertUnwindSafe(|| frame.as_mut().poll(&mut poll_cx))) {
                    Ok(Poll::Pending) => {
                        *self.frame.borrow_mut() = Some(frame);
                    }
                    Ok(Poll::Ready(())) => {
                        drop(frame);
                        self.done.set(true);
                        self.state.set(RunState::Destroyed);
                        trace!(id = %self.id, "task completed");
                        return TaskStatus::Done;
                    }
                    Err(payload) => {
                        // The frame's live locals were dropped during the
                        // unwind, which also orphaned the return slot.
                        drop(frame);
                        *self.panic.borrow_mut() = Some(PanicPayload::new(payload));
                        self.done.set(true);
                        self.state.set(RunState::Destroyed);
                        trace!(id = %self.id, "task panicked");
                        return TaskStatus::Done;
                    }
                }
            }
        }

        if self.done.get() {
            TaskStatus::Done
        } else {
            TaskStatus::Suspended
        }
    }

    fn can_resume(&self) -> bool {
        if self.done.get() {
            return false;
        }
        if let Some(sub) = self.sub_task.borrow().as_ref() {
            return sub.can_resume();
        }
        match self.ready_fn.borrow_mut().as_mut() {
            None => true,
            Some(ready) => ready(),
        }
    }

    /// Destroys the coroutine frame. Idempotent after the first successful
    /// destruction.
    ///
    /// # Panics
    ///
    /// Panics if called while the task is resuming.
    pub(crate) fn kill(&self) {
        assert!(
            self.state.get() != RunState::Resuming,
            "attempted to kill a task while it is resuming"
        );
        if self.state.get() != RunState::Idle {
            return;
        }
        self.done.set(true);
        self.state.set(RunState::Destroyed);
        if let Some(sub) = self.sub_task.borrow_mut().take() {
            sub.kill();
        }
        // Dropping the frame runs the destructors of its locals, scope
        // guards included.
        let frame = self.frame.borrow_mut().take();
        drop(frame);
        *self.ready_fn.borrow_mut() = None;
        trace!(id = %self.id, "task killed");
    }

    /// Sets the stop flag and fans it out to every registered target.
    ///
    /// The target list is drained before iterating, so a request is
    /// delivered at most once per registration and accidental cycles
    /// terminate.
    pub(crate) fn request_stop(self: &Rc<Self>) {
        self.stop_requested.set(true);
        let targets = std::mem::take(&mut *self.stop_targets.borrow_mut());
        if !targets.is_empty() {
            trace!(id = %self.id, targets = targets.len(), "stop request fan-out");
        }
        for target in targets {
            if let Some(target) = target.upgrade() {
                target.request_stop();
            }
        }
    }

    /// Registers `other` for stop fan-out. If a stop was already requested,
    /// `other` is stopped immediately instead.
    pub(crate) fn add_stop_target(&self, other: &Rc<RawTask>) {
        if self.stop_requested.get() {
            other.request_stop();
        } else {
            self.stop_targets.borrow_mut().push(Rc::downgrade(other));
        }
    }

    /// Deregisters `other` by identity (swap-remove).
    pub(crate) fn remove_stop_target(&self, other: &Rc<RawTask>) {
        let needle = Rc::downgrade(other);
        let mut targets = self.stop_targets.borrow_mut();
        if let Some(idx) = targets.iter().position(|t| t.ptr_eq(&needle)) {
            targets.swap_remove(idx);
        }
    }

    pub(crate) fn set_ready_fn(&self, ready: ReadyFn) {
        *self.ready_fn.borrow_mut() = Some(ready);
    }

    pub(crate) fn set_sub_task(&self, sub: Rc<RawTask>) {
        *self.sub_task.borrow_mut() = Some(sub);
    }

    pub(crate) fn clear_sub_task(&self) {
        *self.sub_task.borrow_mut() = None;
    }

    pub(crate) fn has_panicked(&self) -> bool {
        self.panic.borrow().is_some()
    }

    pub(crate) fn take_panic(&self) -> Option<PanicPayload> {
        self.panic.borrow_mut().take()
    }

    pub(crate) fn add_strong_ref(&self) {
        self.strong_count.set(self.strong_count.get() + 1);
    }

    /// Drops one logical strong reference, killing the task when the count
    /// reaches zero.
    pub(crate) fn remove_strong_ref(&self) {
        let count = self.strong_count.get();
        debug_assert!(count > 0, "strong ref count underflow");
        self.strong_count.set(count - 1);
        if count == 1 {
            self.kill();
        }
    }
}

#[cfg(feature = "task-debug")]
impl RawTask {
    pub(crate) fn set_debug_name(&self, name: &'static str) {
        self.debug_name.set(name);
    }

    pub(crate) fn set_debug_data_fn(&self, data_fn: Box<dyn Fn() -> String>) {
        *self.debug_data_fn.borrow_mut() = Some(data_fn);
    }

    pub(crate) fn debug_name_string(&self) -> String {
        let name = self.debug_name.get();
        if !self.is_done() {
            if let Some(data_fn) = self.debug_data_fn.borrow().as_ref() {
                return format!("{name} [{}]", data_fn());
            }
        }
        name.to_string()
    }

    /// Formats the depth-first sub-task chain.
    pub(crate) fn debug_stack_string(&self) -> String {
        match self.sub_task.borrow().as_ref() {
            Some(sub) => format!("{} -> {}", self.debug_name_string(), sub.debug_stack_string()),
            None => self.debug_name_string(),
        }
    }
}
