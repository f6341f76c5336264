//! Single-threaded synchronization primitives for task coordination.

mod promise;

pub use promise::{promise, Promise, TaskFuture};
