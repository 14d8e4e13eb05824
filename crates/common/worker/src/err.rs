// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

/// Result type for worker hooks.
pub type WorkResult<T = ()> = std::result::Result<T, WorkError>;

/// Error severity level for worker operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The driver logs the error and keeps processing commands.
    Transient,

    /// The driver stops the loop and runs `on_shutdown`.
    Fatal,
}

/// Error returned from a worker hook.
///
/// The severity decides what the driver does next; one bad command must not
/// take the loop down, so anything not explicitly fatal is transient.
///
/// ```rust
/// use courier_common_worker::{WorkError, WorkResult};
///
/// fn deliver(reachable: bool) -> WorkResult {
///     if !reachable {
///         return Err(WorkError::transient("endpoint unreachable"));
///     }
///     Ok(())
/// }
/// # assert!(deliver(false).unwrap_err().is_transient());
/// ```
#[derive(Debug)]
pub struct WorkError {
    severity: ErrorSeverity,
    message:  String,
    source:   Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl WorkError {
    pub fn transient(message: impl Into<String>) -> Self {
        WorkError {
            severity: ErrorSeverity::Transient,
            message:  message.into(),
            source:   None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        WorkError {
            severity: ErrorSeverity::Fatal,
            message:  message.into(),
            source:   None,
        }
    }

    pub fn transient_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WorkError {
            severity: ErrorSeverity::Transient,
            message:  message.into(),
            source:   Some(Box::new(source)),
        }
    }

    pub fn fatal_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WorkError {
            severity: ErrorSeverity::Fatal,
            message:  message.into(),
            source:   Some(Box::new(source)),
        }
    }

    pub fn severity(&self) -> ErrorSeverity { self.severity }

    pub fn is_fatal(&self) -> bool { self.severity == ErrorSeverity::Fatal }

    pub fn is_transient(&self) -> bool { self.severity == ErrorSeverity::Transient }

    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            ErrorSeverity::Transient => "transient",
            ErrorSeverity::Fatal => "fatal",
        };
        write!(f, "[{}] {}", severity, self.message)?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for WorkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// A command could not be handed to the operation queue.
///
/// The rejected command is returned so the caller can retry or drop it.
#[derive(PartialEq, Eq)]
pub enum SubmitError<T> {
    /// The queue is at capacity (only from non-blocking submission).
    Full(T),
    /// The queue has been shut down.
    Closed(T),
}

impl<T> SubmitError<T> {
    pub fn into_inner(self) -> T {
        match self {
            SubmitError::Full(item) | SubmitError::Closed(item) => item,
        }
    }

    pub fn is_closed(&self) -> bool { matches!(self, SubmitError::Closed(_)) }
}

impl<T> fmt::Debug for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Full(_) => f.write_str("Full(..)"),
            SubmitError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Full(_) => f.write_str("operation queue is full"),
            SubmitError::Closed(_) => f.write_str("operation queue is closed"),
        }
    }
}

impl<T> std::error::Error for SubmitError<T> {}
