#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use cotick::TaskTime;
use std::cell::Cell;
use std::rc::Rc;

/// A hand-advanced clock standing in for the host's time system.
///
/// Tests drive simulated time explicitly: advance the clock, then update
/// the manager, mirroring a host that samples its clock once per frame.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<TaskTime>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> TaskTime {
        self.now.get()
    }

    pub fn set(&self, t: TaskTime) {
        self.now.set(t);
    }

    pub fn advance(&self, dt: TaskTime) {
        self.now.set(self.now.get() + dt);
    }

    /// A time-stream closure reading this clock.
    pub fn time_fn(&self) -> impl Fn() -> TaskTime + Clone + 'static {
        let now = self.now.clone();
        move || now.get()
    }
}
