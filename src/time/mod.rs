//! Time-streams for time-sensitive awaiters.
//!
//! Interactive applications commonly run several clocks at once (game time,
//! real time, paused time, audio time). The runtime therefore never owns a
//! clock: every time-sensitive operation takes a *time-stream*, a closure
//! returning the current time in seconds for whichever clock the caller
//! cares about. The closure must be monotonic and side-effect free.
//!
//! For projects with a single clock the `global-time` feature adds a
//! host-registered global source and `*_global` variants of the
//! time-sensitive operations; see [`set_global_time_source`].
//!
//! It is recommended that the host sample its clock once per tick and return
//! the sampled value from the time-stream, so that every task resumed within
//! one tick observes the same instant.

/// Scalar time in seconds.
#[cfg(not(feature = "double-precision-time"))]
pub type TaskTime = f32;

/// Scalar time in seconds.
#[cfg(feature = "double-precision-time")]
pub type TaskTime = f64;

/// Returns the time elapsed in `time_fn`'s stream since `start`.
pub fn elapsed_since<F: Fn() -> TaskTime>(start: TaskTime, time_fn: &F) -> TaskTime {
    time_fn() - start
}

#[cfg(feature = "global-time")]
mod global {
    use super::TaskTime;
    use std::cell::RefCell;
    use std::rc::Rc;

    thread_local! {
        static GLOBAL_TIME: RefCell<Option<Rc<dyn Fn() -> TaskTime>>> =
            const { RefCell::new(None) };
    }

    /// Registers the global time source for the driving thread.
    ///
    /// Must be called before any `*_global` operation runs. Registering a
    /// new source replaces the previous one.
    pub fn set_global_time_source<F: Fn() -> TaskTime + 'static>(time_fn: F) {
        GLOBAL_TIME.with(|g| *g.borrow_mut() = Some(Rc::new(time_fn)));
    }

    /// Samples the global time source.
    ///
    /// # Panics
    ///
    /// Panics if no source was registered on this thread.
    #[must_use]
    pub fn global_time() -> TaskTime {
        GLOBAL_TIME.with(|g| {
            let g = g.borrow();
            let f = g
                .as_ref()
                .expect("global time source was never registered (see set_global_time_source)");
            f()
        })
    }

    /// Returns a cloneable time-stream backed by the global source.
    ///
    /// The source is re-read on every call, so it may be registered after
    /// this function but before the stream is first sampled.
    #[must_use]
    pub fn global_time_fn() -> impl Fn() -> TaskTime + Clone {
        global_time
    }
}

#[cfg(feature = "global-time")]
pub use global::{global_time, global_time_fn, set_global_time_source};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_since_subtracts() {
        let now = || 5.0 as TaskTime;
        assert_eq!(elapsed_since(2.0, &now), 3.0);
    }

    #[cfg(feature = "global-time")]
    #[test]
    fn global_source_roundtrip() {
        set_global_time_source(|| 1.5);
        assert_eq!(global_time(), 1.5);
        let f = global_time_fn();
        assert_eq!(f(), 1.5);
    }
}
