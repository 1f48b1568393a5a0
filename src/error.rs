//! Domain-specific error types for rsdetect.
//!
//! This module defines `RsdetectError`, a `thiserror`-based enum that
//! provides typed error variants for every failure the invocation pipeline
//! can report. Public API functions return `Result<T, RsdetectError>` for
//! programmatic error handling, while trait boundaries (command execution,
//! downloading) continue to use `anyhow::Result`.
//!
//! `RsdetectError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically at trait boundaries that return `anyhow::Result`.
//! [`RsdetectError::from_anyhow`] recovers the typed variant on the way back.

use std::io;

use camino::Utf8PathBuf;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent, user-friendly messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)"). For unrecognized
/// error kinds, falls back to including the OS-level error message
/// directly (e.g., "I/O error: connection refused").
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Domain-specific error type for rsdetect.
///
/// Every variant except [`RsdetectError::Execution`] is raised before the
/// scanner process is spawned, so callers can map them to "build failed"
/// without worrying about a half-finished scan. [`RsdetectError::Cancelled`]
/// is kept distinct so it can be reported as "build aborted" instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RsdetectError {
    /// The property string could not be split into arguments.
    #[error("argument syntax error: {0}")]
    ArgumentSyntax(String),

    /// No execution strategy could be resolved from the available configuration.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    /// The air-gapped installation did not contain exactly one Detect jar.
    #[error("expected exactly one Detect jar in {directory} but found {count}")]
    ArtifactResolution {
        /// Number of matching jars found.
        count: usize,
        /// Directory that was scanned.
        directory: Utf8PathBuf,
    },

    /// The Detect script could not be downloaded.
    #[error("failed to download {url}: {reason}")]
    ArtifactDownload {
        /// The URL that was requested.
        url: String,
        /// Human-readable reason (HTTP status, empty body, write failure).
        reason: String,
    },

    /// The invocation was interrupted while waiting on a remote or process call.
    #[error("invocation cancelled")]
    Cancelled,

    /// A configuration file could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A validation constraint was violated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A command execution failed (spawn failure, wait failure, signal, thread panic, etc.).
    ///
    /// A non-zero exit code is not an error; it is reported through
    /// [`crate::executor::ExecutionResult`].
    #[error("command execution failed: {command}: {status}")]
    Execution {
        /// The command that was executed.
        command: String,
        /// Human-readable reason for the failure.
        status: String,
    },

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred (usually a path).
        context: String,
        /// Human-readable description derived from [`io_error_kind_message`].
        message: String,
        /// The underlying I/O error, preserved for programmatic inspection.
        #[source]
        source: std::io::Error,
    },

    /// Any other failure, surfaced as a generic pipeline failure.
    #[error("unexpected pipeline failure: {0}")]
    Unexpected(String),
}

impl RsdetectError {
    /// Creates an `Io` variant with the `message` field automatically derived
    /// from the `source` via [`io_error_kind_message`].
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }

    /// Recovers a typed error from an `anyhow::Error` produced at a trait boundary.
    ///
    /// If the chain carries an `RsdetectError` it is returned as-is; anything
    /// else is wrapped in [`RsdetectError::Unexpected`] with the full context chain.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<RsdetectError>() {
            Ok(typed) => typed,
            Err(other) => Self::Unexpected(format!("{:#}", other)),
        }
    }

    /// Returns true if this error represents an interruption rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
