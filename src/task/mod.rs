//! The task machine: internal records, the handle algebra, the body
//! context, and the awaiter futures.
//!
//! See [`Task`] for the handle rules and [`TaskCtx`] for the awaiter
//! surface.

pub(crate) mod raw;
pub(crate) mod slot;

mod awaiter;
mod ctx;
mod debug;
mod handle;

pub use awaiter::{Suspend, SuspendIf, WaitFuture, WaitTask, WaitUntil};
pub use ctx::{StopContext, TaskCtx};
pub use debug::{DebugStackFormat, DebugStackFormatter};
pub use handle::{AsTaskRef, Task, TaskHandle, TaskRef, WeakTask, WeakTaskHandle};
