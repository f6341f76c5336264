//! Return-value slot.
//!
//! Each typed task shares one `RetSlot` between the wrapper future that
//! drives the body and the strong handles that may take the value. State
//! transitions are monotonic: `Unset -> Set -> Taken` on the happy path,
//! `Unset -> Orphaned` when the frame is destroyed before a value was set
//! (kill, or a panic in the body).

use std::cell::RefCell;
use std::rc::Rc;

enum SlotState<T> {
    /// No value yet.
    Unset,
    /// Value stored and takeable.
    Set(T),
    /// Value was taken; taking again is a programmer bug.
    Taken,
    /// The frame ended without setting a value; a value will never arrive.
    Orphaned,
}

pub(crate) struct RetSlot<T> {
    state: RefCell<SlotState<T>>,
}

impl<T> RetSlot<T> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(SlotState::Unset),
        })
    }

    /// Stores the completed body's value. Single assignment.
    pub(crate) fn set(&self, value: T) {
        let mut state = self.state.borrow_mut();
        match *state {
            SlotState::Unset => *state = SlotState::Set(value),
            SlotState::Set(_) => {
                panic!("attempted to set a task's return value when it was already set")
            }
            SlotState::Taken => {
                panic!("attempted to set a task's return value after it was already taken")
            }
            SlotState::Orphaned => {
                panic!("attempted to set a task's return value after it was orphaned")
            }
        }
    }

    /// Takes the value if one was set.
    ///
    /// `Unset` and `Orphaned` yield `None` and leave the state unchanged, so
    /// a task that was killed early reads as having no value. Taking twice
    /// is a programmer bug.
    pub(crate) fn take(&self) -> Option<T> {
        let mut state = self.state.borrow_mut();
        match std::mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Set(value) => Some(value),
            SlotState::Unset => {
                *state = SlotState::Unset;
                None
            }
            SlotState::Orphaned => {
                *state = SlotState::Orphaned;
                None
            }
            SlotState::Taken => {
                panic!("attempted to take a task's return value after it was already taken")
            }
        }
    }

    fn orphan_if_unset(&self) {
        let mut state = self.state.borrow_mut();
        if matches!(*state, SlotState::Unset) {
            *state = SlotState::Orphaned;
        }
    }
}

/// Frame-local guard that orphans the slot if the frame is dropped before a
/// value was stored. Lives at the top of every wrapper future.
pub(crate) struct OrphanGuard<T> {
    slot: Rc<RetSlot<T>>,
}

impl<T> OrphanGuard<T> {
    pub(crate) fn new(slot: Rc<RetSlot<T>>) -> Self {
        Self { slot }
    }
}

impl<T> Drop for OrphanGuard<T> {
    fn drop(&mut self) {
        self.slot.orphan_if_unset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_take_yields_value_once() {
        let slot = RetSlot::new();
        slot.set(7);
        assert_eq!(slot.take(), Some(7));
    }

    #[test]
    #[should_panic(expected = "already taken")]
    fn second_take_is_fatal() {
        let slot = RetSlot::new();
        slot.set(7);
        let _ = slot.take();
        let _ = slot.take();
    }

    #[test]
    fn unset_take_yields_none_and_is_retryable() {
        let slot: Rc<RetSlot<i32>> = RetSlot::new();
        assert_eq!(slot.take(), None);
        slot.set(3);
        assert_eq!(slot.take(), Some(3));
    }

    #[test]
    fn orphan_guard_marks_unset_slots() {
        let slot: Rc<RetSlot<i32>> = RetSlot::new();
        drop(OrphanGuard::new(slot.clone()));
        assert_eq!(slot.take(), None);
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn orphan_guard_leaves_set_slots_alone() {
        let slot = RetSlot::new();
        let guard = OrphanGuard::new(slot.clone());
        slot.set(11);
        drop(guard);
        assert_eq!(slot.take(), Some(11));
    }
}
