//! Domain-specific error types for the terraform plugin.
//!
//! This module defines `PluginError`, a `thiserror`-based enum that
//! provides typed error variants for the failure modes of a plugin run.
//! Public API functions return `Result<T, PluginError>` for programmatic error
//! handling, while the executor trait and orchestration code use `anyhow::Result`.
//!
//! `PluginError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically at boundaries that return `anyhow::Result`.
//! The binary downcasts back to `PluginError` to pick its exit code.

use std::io;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)"). For unrecognized
/// error kinds, falls back to the OS-level error message.
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Domain-specific error type for the terraform plugin.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PluginError {
    /// A `vars` or `secrets` payload was not a JSON object of strings.
    ///
    /// Always fatal: the run stops before any command is executed.
    #[error("failed to decode {option}: {source}")]
    ConfigDecode {
        /// Name of the option that failed to decode.
        option: String,
        #[source]
        source: serde_json::Error,
    },

    /// A scalar option carried a value that does not parse as its declared kind.
    #[error("invalid value {value:?} for {option}: expected {expected}")]
    InvalidValue {
        option: String,
        value: String,
        expected: &'static str,
    },

    /// An entry in the action list is not a known terraform step.
    #[error(
        "valid actions are: fmt, validate, plan, plan-destroy, apply, destroy, summarize. \
        You provided {0}"
    )]
    InvalidAction(String),

    /// The requested binary could not be located in PATH.
    #[error("command not found in PATH: {command}")]
    CommandNotFound { command: String },

    /// A command exited unsuccessfully or could not be driven to completion.
    #[error("command execution failed: {command}: {}", describe_code(.code))]
    Execution {
        /// The command that was executed.
        command: String,
        /// Exit code of the child, if it exited normally.
        code: Option<i32>,
    },

    /// Downloading a terraform release failed.
    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// Assuming the configured AWS role failed.
    #[error("failed to assume role: {0}")]
    RoleAssumption(String),

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred, usually a path.
        context: String,
        /// Derived from [`io_error_kind_message`].
        message: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status: {}", code),
        None => "terminated without exit status".to_string(),
    }
}

impl PluginError {
    /// Creates an `Io` variant with the `message` field derived from `source`.
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }

    /// Process exit code to use when this error ends the run.
    ///
    /// Failed commands propagate the child's own exit code; everything
    /// else maps to `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Execution {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}
