//! End-to-end coverage of token lists, including token/task interplay.

mod common;

use common::ManualClock;
use cotick::combinator::wait_seconds;
use cotick::token::TokenList;
use cotick::{Task, TaskManager};
use std::rc::Rc;

/// Aggregates follow the set of live holders.
#[test]
fn aggregates_follow_live_holders() {
    let list: TokenList<i32> = TokenList::new();
    let three = list.take_token("three", 3);
    let seven = list.take_token("seven", 7);
    let five = list.take_token("five", 5);

    assert_eq!(list.get_max(), Some(7));
    assert_eq!(list.get_min(), Some(3));
    assert_eq!(list.get_most_recent(), Some(5));
    assert_eq!(list.get_least_recent(), Some(3));

    drop(seven);
    assert_eq!(list.get_max(), Some(5));
    assert!(list.has_tokens());

    drop(three);
    drop(five);
    assert!(!list.has_tokens());
}

/// Tokens held inside task frames vanish when the task ends, however it
/// ends.
#[test]
fn tokens_release_when_their_task_dies() {
    let clock = ManualClock::new();
    let poison: Rc<TokenList<f32>> = Rc::new(TokenList::new());
    let mut mgr = TaskManager::new();

    let spawn_poison = |dps: f32, duration: cotick::TaskTime| {
        let poison = poison.clone();
        let time_fn = clock.time_fn();
        Task::new(move |cx| async move {
            let _token = poison.take_token("poison instance", dps);
            let _ = cx.wait(wait_seconds(duration, time_fn)).await;
        })
    };

    let _weak = mgr.run_managed(spawn_poison(2.5, 1.0));
    let strong = mgr.run(spawn_poison(4.0, 10.0));

    mgr.update();
    assert_eq!(poison.get_max(), Some(4.0));
    assert_eq!(poison.get_token_data().len(), 2);

    // First instance expires on the clock.
    clock.set(1.0);
    mgr.update();
    assert_eq!(poison.get_max(), Some(4.0));
    assert_eq!(poison.get_token_data().len(), 1);

    // Second instance is killed outright; its token must vanish with it.
    drop(strong);
    assert!(!poison.has_tokens());
    assert_eq!(poison.get_max(), None);
}

#[test]
fn mean_and_contains_track_membership() {
    let list: TokenList<i32> = TokenList::new();
    let a = list.take_token("a", 2);
    let b = list.take_token("b", 4);
    assert_eq!(list.get_mean(), Some(3.0));
    assert!(list.contains(&2));
    assert!(!list.contains(&9));
    drop(a);
    assert_eq!(list.get_mean(), Some(4.0));
    drop(b);
    assert_eq!(list.get_mean(), None);
}

#[test]
fn debug_string_reflects_the_live_set() {
    let list: TokenList = TokenList::new();
    assert_eq!(list.get_debug_string(), "[no tokens]");
    let a = list.take_token("first", ());
    let b = list.take_token("second", ());
    assert_eq!(list.get_debug_string(), "first\nsecond");
    drop(a);
    assert_eq!(list.get_debug_string(), "second");
    drop(b);
    assert_eq!(list.get_debug_string(), "[no tokens]");
}
