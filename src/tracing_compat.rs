//! Logging compatibility layer.
//!
//! With the `tracing-integration` feature the engine logs every match
//! decision, edge, and wire message through `tracing`. Without it the same
//! macro names compile to nothing, so the hot paths carry no logging cost
//! and no dependency.
//!
//! Engine modules import from here, never from `tracing` directly:
//!
//! ```ignore
//! use crate::tracing_compat::{debug, trace};
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    /// No-op stand-in for `tracing::trace!`.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {{}};
    }

    /// No-op stand-in for `tracing::debug!`.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {{}};
    }

    /// No-op stand-in for `tracing::info!`.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {{}};
    }

    /// No-op stand-in for `tracing::warn!`.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {{}};
    }

    /// No-op stand-in for `tracing::error!`.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {{}};
    }
}

#[cfg(not(feature = "tracing-integration"))]
pub use crate::{debug, error, info, trace, warn};
