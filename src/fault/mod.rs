//! Faults raised by controller actions and how they become error pages.
//!
//! An action fails either by returning `Err(Fault)` or by panicking. Both are
//! intercepted by a per-request [`FaultHandler`]; panics are converted into a
//! [`Fault`] using the location the process-wide panic hook recorded.

mod handler;
pub mod hook;
pub mod log;
pub mod page;

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;

use crate::error::TemplateError;

pub use handler::{FaultHandler, FaultPolicy, HandlerState};

/// Message shown in production for panics, whose text may leak internals.
pub const GENERIC_MESSAGE: &str = "Something went wrong on our end. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Returned by an action as `Err(Fault)`.
    Raised,
    /// A panic caught while running an action.
    Panic,
}

/// An error raised by, or a panic inside, an action.
#[derive(Debug, Clone)]
pub struct Fault {
    pub message: String,
    /// HTTP status this fault asks for. Invalid codes become 500.
    pub code: u16,
    pub kind: FaultKind,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub trace: String,
}

impl Fault {
    /// A raised fault with status 500, located at the caller.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self::located(message.into(), 500, Location::caller())
    }

    /// A raised fault asking for a specific status, located at the caller.
    #[track_caller]
    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self::located(message.into(), code, Location::caller())
    }

    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::located(message.into(), 404, Location::caller())
    }

    fn located(message: String, code: u16, location: &Location<'_>) -> Self {
        Self {
            message,
            code,
            kind: FaultKind::Raised,
            file: Some(location.file().to_string()),
            line: Some(location.line()),
            trace: Backtrace::force_capture().to_string(),
        }
    }

    /// Build a fault from a caught panic payload and whatever the hook recorded.
    pub fn from_panic(
        payload: &(dyn std::any::Any + Send),
        record: Option<hook::PanicRecord>,
    ) -> Self {
        let message = panic_message(payload);
        match record {
            Some(record) => Self {
                message,
                code: 500,
                kind: FaultKind::Panic,
                file: record.file,
                line: record.line,
                trace: record.trace,
            },
            None => Self {
                message,
                code: 500,
                kind: FaultKind::Panic,
                file: None,
                line: None,
                trace: String::new(),
            },
        }
    }

    /// The HTTP status to respond with.
    pub fn status(&self) -> u16 {
        if (100..=599).contains(&self.code) {
            self.code
        } else {
            500
        }
    }

    /// The message safe to show outside debug mode.
    pub fn public_message(&self) -> &str {
        match self.kind {
            FaultKind::Raised => &self.message,
            FaultKind::Panic => GENERIC_MESSAGE,
        }
    }

    /// `file:line` when the location is known.
    pub fn location(&self) -> Option<String> {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            (Some(file), None) => Some(file.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(location) = self.location() {
            write!(f, " at {}", location)?;
        }
        Ok(())
    }
}

impl std::error::Error for Fault {}

impl From<TemplateError> for Fault {
    #[track_caller]
    fn from(err: TemplateError) -> Self {
        Self::located(err.to_string(), 500, Location::caller())
    }
}

/// Extract the message from a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
