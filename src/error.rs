//! Error types and error handling strategy for the dependency engine.
//!
//! Error handling here follows a hard split:
//!
//! - Matcher invariant violations (counter underflow, a task depending on
//!   itself, a copy-in entry missing after synthesis) are bugs and abort via
//!   `assert!`/`panic!`. They never surface as `Error`.
//! - Protocol and configuration problems (an unsupported remote dependency
//!   kind, a stale wire reference, a bad bucket count) are explicit, typed,
//!   and propagated with `?`.
//! - Lock poisoning is fatal; the engine's state is torn at that point.
//!
//! Errors carry a kind, an optional message, an optional source, and
//! structured context (task, unit, phase) for diagnostics.

use core::fmt;
use std::sync::Arc;

use crate::types::{Phase, TaskId, UnitId};

/// Convenience alias for engine results.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Remote protocol ===
    /// A remote request carried a dependency kind other than plain input.
    UnsupportedRemoteDep,
    /// A wire message named a task this unit no longer knows (stale id).
    UnknownTask,
    /// Message could not be handed to the transport.
    Transport,

    // === Local requests ===
    /// A task id did not resolve in the task table.
    NoSuchTask,
    /// Copy-in synthesis was requested but no spawner collaborator is wired.
    CopyinFailed,

    // === Configuration ===
    /// Rejected configuration value.
    InvalidConfig,

    // === Internal / state machine ===
    /// Invalid state detected (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedRemoteDep | Self::UnknownTask | Self::Transport => {
                ErrorCategory::Remote
            }
            Self::NoSuchTask | Self::CopyinFailed => ErrorCategory::Local,
            Self::InvalidConfig => ErrorCategory::Config,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Returns the recoverability classification for this error kind.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        match self {
            // The message pump drops these and keeps going.
            Self::UnknownTask => Recoverability::Transient,

            Self::UnsupportedRemoteDep
            | Self::NoSuchTask
            | Self::CopyinFailed
            | Self::InvalidConfig
            | Self::Internal => Recoverability::Permanent,

            Self::Transport => Recoverability::Unknown,
        }
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Remote protocol failures.
    Remote,
    /// Local request failures.
    Local,
    /// Configuration rejection.
    Config,
    /// Internal engine errors.
    Internal,
}

/// Classification of error recoverability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recoverability {
    /// Safe to drop or retry; the engine stays consistent.
    Transient,
    /// Will not succeed on retry.
    Permanent,
    /// Depends on the transport or embedding runtime.
    Unknown,
}

/// Diagnostic context for an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The task involved, if any.
    pub task: Option<TaskId>,
    /// The unit the failing operation concerned.
    pub unit: Option<UnitId>,
    /// The phase of the failing dependency.
    pub phase: Option<Phase>,
}

/// The main error type for engine operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    context: ErrorContext,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            context: ErrorContext {
                task: None,
                unit: None,
                phase: None,
            },
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the recoverability classification.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        self.kind.recoverability()
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds structured context to the error.
    #[must_use]
    pub const fn with_context(mut self, ctx: ErrorContext) -> Self {
        self.context = ctx;
        self
    }

    /// Attaches the involved task.
    #[must_use]
    pub const fn with_task(mut self, task: TaskId) -> Self {
        self.context.task = Some(task);
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the error context.
    #[must_use]
    pub const fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Creates an unsupported-remote-dependency error.
    #[must_use]
    pub fn unsupported_remote_dep(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedRemoteDep).with_message(detail)
    }

    /// Creates a stale-wire-reference error.
    #[must_use]
    pub fn unknown_task(raw: u64) -> Self {
        Self::new(ErrorKind::UnknownTask).with_message(format!("no task for wire id {raw:#x}"))
    }

    /// Creates an unresolvable-task-id error.
    #[must_use]
    pub fn no_such_task(task: TaskId) -> Self {
        Self::new(ErrorKind::NoSuchTask)
            .with_message(format!("task {task} not in table"))
            .with_task(task)
    }

    /// Creates an internal error (engine bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(task) = self.context.task {
            write!(f, " ({task})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}
