//! Logging compatibility layer.
//!
//! Provides a unified logging interface whether or not the
//! `tracing-integration` feature is enabled:
//!
//! - **With the feature**: re-exports the `tracing` macros.
//! - **Without it**: no-op macros that compile to nothing.
//!
//! Internal modules import from here rather than from `tracing` directly so
//! that the core never grows a hard logging dependency.

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }
}

#[cfg(not(feature = "tracing-integration"))]
pub use crate::{debug, error, info, trace, warn};
