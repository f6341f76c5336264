//! Promise/future pair.
//!
//! A [`Promise`] is the producing half: some piece of host code fulfills it
//! with a value. A [`TaskFuture`] is the consuming half: a task awaits it
//! through [`TaskCtx::wait_future`](crate::task::TaskCtx::wait_future),
//! which polls non-blockingly via the readiness gate.
//!
//! Dropping a promise unfulfilled *breaks* the future: waiters observe
//! [`PromiseDropped`] instead of hanging forever.
//!
//! The pair is single-threaded and single-consumer: the value can be taken
//! exactly once.

use crate::error::PromiseDropped;
use std::cell::RefCell;
use std::rc::Rc;

enum SharedState<T> {
    Pending,
    Ready(T),
    Taken,
    Broken,
}

type Shared<T> = Rc<RefCell<SharedState<T>>>;

/// Creates a connected promise/future pair.
#[must_use]
pub fn promise<T>() -> (Promise<T>, TaskFuture<T>) {
    let shared: Shared<T> = Rc::new(RefCell::new(SharedState::Pending));
    (
        Promise {
            shared: Some(shared.clone()),
        },
        TaskFuture { shared },
    )
}

/// The producing half: fulfill it with a value, or drop it to break the
/// future.
#[must_use = "dropping a Promise unfulfilled breaks its future"]
pub struct Promise<T> {
    // Taken on fulfillment so the Drop impl leaves the value alone.
    shared: Option<Shared<T>>,
}

impl<T> Promise<T> {
    /// Fulfills the promise.
    pub fn set(mut self, value: T) {
        if let Some(shared) = self.shared.take() {
            *shared.borrow_mut() = SharedState::Ready(value);
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let mut state = shared.borrow_mut();
            if matches!(*state, SharedState::Pending) {
                *state = SharedState::Broken;
            }
        }
    }
}

/// The consuming half of a promise.
pub struct TaskFuture<T> {
    shared: Shared<T>,
}

impl<T> TaskFuture<T> {
    /// Returns whether the promise has been fulfilled or broken.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(*self.shared.borrow(), SharedState::Pending)
    }

    /// Returns whether a value is available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.shared.borrow(), SharedState::Ready(_))
    }

    /// Takes the settled result without blocking.
    ///
    /// `None` while the promise is unfulfilled.
    ///
    /// # Panics
    ///
    /// Panics if the value was already taken.
    pub fn try_take(&self) -> Option<Result<T, PromiseDropped>> {
        let mut state = self.shared.borrow_mut();
        match &*state {
            SharedState::Pending => None,
            SharedState::Broken => Some(Err(PromiseDropped)),
            SharedState::Taken => panic!("attempted to take a promised value twice"),
            SharedState::Ready(_) => {
                let SharedState::Ready(value) = std::mem::replace(&mut *state, SharedState::Taken)
                else {
                    unreachable!()
                };
                Some(Ok(value))
            }
        }
    }

    /// Returns another reference to the same shared state.
    #[must_use]
    pub fn clone_ref(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        self.clone_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfilled_promise_yields_value_once() {
        let (p, f) = promise();
        assert!(!f.is_settled());
        p.set(9);
        assert!(f.is_ready());
        assert_eq!(f.try_take(), Some(Ok(9)));
    }

    #[test]
    fn dropped_promise_breaks_future() {
        let (p, f) = promise::<u32>();
        drop(p);
        assert!(f.is_settled());
        assert!(!f.is_ready());
        assert_eq!(f.try_take(), Some(Err(PromiseDropped)));
    }

    #[test]
    #[should_panic(expected = "twice")]
    fn double_take_is_fatal() {
        let (p, f) = promise();
        p.set(1);
        let _ = f.try_take();
        let _ = f.try_take();
    }
}
