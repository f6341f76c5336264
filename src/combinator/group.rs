//! Any/all/select over a set of entries.
//!
//! Each group task registers every entry as a stop-target of itself, then
//! loops: resume each entry in insertion order, check the completion
//! condition, suspend one tick. Entries are owned by the group's frame, so
//! when the group returns (or is killed) the remaining entries are dropped
//! and therefore killed.

use super::entry::{Entry, SelectEntry};
use crate::task::{Task, TaskCtx};
use crate::types::TaskStatus;

/// Waits until at least one entry is done.
///
/// Completes in the same update in which the first entry finishes; the
/// remaining entries are killed at that point.
pub fn wait_for_any(entries: Vec<Entry>) -> Task<()> {
    Task::new(move |cx| async move {
        cx.set_debug_name("WaitForAny");
        install_entries_debug(&cx, &entries, false);
        for entry in &entries {
            cx.add_stop_target(&entry.task);
        }
        let mut entries = entries;
        loop {
            for entry in &mut entries {
                if entry.task.resume() == TaskStatus::Done {
                    return;
                }
            }
            cx.suspend().await;
        }
    })
}

/// Waits until every entry is done.
///
/// Completes in the update in which the last entry finishes.
pub fn wait_for_all(entries: Vec<Entry>) -> Task<()> {
    Task::new(move |cx| async move {
        cx.set_debug_name("WaitForAll");
        install_entries_debug(&cx, &entries, true);
        for entry in &entries {
            cx.add_stop_target(&entry.task);
        }
        let mut entries = entries;
        loop {
            let mut all_done = true;
            for entry in &mut entries {
                if entry.task.resume() != TaskStatus::Done {
                    all_done = false;
                }
            }
            if all_done {
                return;
            }
            cx.suspend().await;
        }
    })
}

/// Waits like [`wait_for_any`], yielding the value associated with the
/// first entry to finish. Same-tick ties resolve by insertion order.
pub fn select<V: 'static>(entries: Vec<SelectEntry<V>>) -> Task<V> {
    Task::new(move |cx| async move {
        cx.set_debug_name("Select");
        install_select_debug(&cx, &entries);
        for entry in &entries {
            cx.add_stop_target(&entry.task);
        }
        let mut entries = entries;
        loop {
            for index in 0..entries.len() {
                if entries[index].task.resume() == TaskStatus::Done {
                    return entries.swap_remove(index).value;
                }
            }
            cx.suspend().await;
        }
    })
}

#[cfg(feature = "task-debug")]
fn install_entries_debug(cx: &TaskCtx, entries: &[Entry], annotate: bool) {
    let handles: Vec<_> = entries.iter().map(|e| e.task.downgrade()).collect();
    cx.set_debug_data(move || entry_stacks(handles.iter(), annotate));
}

#[cfg(feature = "task-debug")]
fn install_select_debug<V>(cx: &TaskCtx, entries: &[SelectEntry<V>]) {
    let handles: Vec<_> = entries.iter().map(|e| e.task.downgrade()).collect();
    cx.set_debug_data(move || entry_stacks(handles.iter(), false));
}

/// Encodes the entry stacks one indent level below the group (back-tick
/// depth markers, see the debug formatter).
#[cfg(feature = "task-debug")]
fn entry_stacks<'a, I>(handles: I, annotate: bool) -> String
where
    I: Iterator<Item = &'a crate::task::WeakTaskHandle>,
{
    let mut out = String::new();
    for handle in handles {
        out.push_str(if out.is_empty() { "\n`" } else { "\n" });
        out.push_str(&handle.debug_stack(None));
        if annotate {
            out.push_str(if handle.is_done() {
                " [DONE]"
            } else {
                " [RUNNING]"
            });
        }
    }
    out.push_str("`\n");
    out
}

#[cfg(not(feature = "task-debug"))]
fn install_entries_debug(_cx: &TaskCtx, _entries: &[Entry], _annotate: bool) {}

#[cfg(not(feature = "task-debug"))]
fn install_select_debug<V>(_cx: &TaskCtx, _entries: &[SelectEntry<V>]) {}
