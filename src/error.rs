use std::fmt;
use std::process::ExitStatus;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

/// The closed set of failure categories every operation reports through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    CommandFailed,
    Parse,
    InvalidInput,
    NotRunning,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::CommandFailed => "command_failed",
            ErrorKind::Parse => "parse",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotRunning => "not_running",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-level failure wrapped by a [`MirrorError`].
#[derive(Error, Debug)]
pub enum Cause {
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("deadline elapsed")]
    Deadline(#[from] tokio::time::error::Elapsed),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("process exited with {0}")]
    Exit(ExitStatus),

    #[error("{0}")]
    Output(String),
}

/// Uniform error carrier handed to the front end.
///
/// Binds an [`ErrorKind`] to the command that produced it, whatever the
/// process printed, its exit code (when one exists) and the wrapped cause.
#[derive(Error, Debug)]
pub struct MirrorError {
    pub kind: ErrorKind,
    pub message: String,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process never produced an exit status (spawn failure,
    /// timeout, killed by a signal) or the failure came from its output.
    pub exit_code: Option<i32>,
    #[source]
    pub cause: Option<Cause>,
}

impl MirrorError {
    fn bare(kind: ErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            command: String::new(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            cause: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::bare(ErrorKind::InvalidInput, message.into())
    }

    pub fn not_running(message: impl Into<String>) -> Self {
        Self::bare(ErrorKind::NotRunning, message.into())
    }

    pub fn timeout(command: impl Into<String>, cause: Cause) -> Self {
        let command = command.into();
        Self {
            message: format!("timeout while running {}", command),
            command,
            cause: Some(cause),
            ..Self::bare(ErrorKind::Timeout, String::new())
        }
    }

    pub fn command_failed(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: Option<i32>,
        cause: Cause,
    ) -> Self {
        let command = command.into();
        Self {
            kind: ErrorKind::CommandFailed,
            message: format!("command failed: {}", command),
            command,
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            cause: Some(cause),
        }
    }

    pub fn parse(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        cause: Cause,
    ) -> Self {
        let command = command.into();
        Self {
            kind: ErrorKind::Parse,
            message: format!("unexpected output from {}", command),
            command,
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: None,
            cause: Some(cause),
        }
    }

    /// Replace the generated message, keeping everything else.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            f.write_str(&self.message)
        } else if !self.command.is_empty() {
            write!(f, "{}: {}", self.kind, self.command)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl Serialize for MirrorError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("MirrorError", 7)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("command", &self.command)?;
        state.serialize_field("stdout", &self.stdout)?;
        state.serialize_field("stderr", &self.stderr)?;
        state.serialize_field("exit_code", &self.exit_code)?;
        state.serialize_field("cause", &self.cause.as_ref().map(|c| c.to_string()))?;
        state.end()
    }
}
