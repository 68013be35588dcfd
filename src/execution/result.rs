//! Execution result types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

/// Exit code recorded when the process could not be run at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 999;

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The child ran and exited.
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// The child could not be run.
    SpawnFailed { exit_code: i32, message: String },
}

impl Outcome {
    /// Build a spawn failure from an error description.
    ///
    /// The exit code is taken from an `error code: <digits>` fragment in
    /// `cause` (the underlying OS error text, never the caller's command)
    /// when present and non-zero, otherwise it is [`SPAWN_FAILURE_EXIT_CODE`].
    pub fn spawn_failed(message: impl Into<String>, cause: &str) -> Self {
        let exit_code = embedded_error_code(cause).unwrap_or(SPAWN_FAILURE_EXIT_CODE);
        Self::SpawnFailed {
            exit_code,
            message: message.into(),
        }
    }

    /// Exit code of the outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { exit_code, .. } | Self::SpawnFailed { exit_code, .. } => *exit_code,
        }
    }
}

/// Extract `<digits>` from the first `error code: <digits>` in `text`.
///
/// Zero is rejected: a process that never ran must not look successful.
fn embedded_error_code(text: &str) -> Option<i32> {
    const MARKER: &str = "error code: ";

    text.match_indices(MARKER).find_map(|(idx, _)| {
        let rest = &text[idx + MARKER.len()..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        rest[..end].parse().ok()
    })
    .filter(|&code| code != 0)
}

/// Result of running one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandExecution {
    command: String,
    directory: PathBuf,
    #[serde(flatten)]
    outcome: Outcome,
    duration: Duration,
}

impl CommandExecution {
    /// Create a new execution result.
    pub fn new(
        command: impl Into<String>,
        directory: impl Into<PathBuf>,
        outcome: Outcome,
        duration: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            directory: directory.into(),
            outcome,
            duration,
        }
    }

    /// Check if the exit code is 0.
    pub fn ok(&self) -> bool {
        self.exit_code() == 0
    }

    /// Check if the process never started.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self.outcome, Outcome::SpawnFailed { .. })
    }

    /// Command string as given to the runner.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Working directory the command ran in.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// How the invocation ended.
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Wall time of the invocation.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Exit code of the child, or the spawn failure code.
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }

    /// Captured stdout. Empty when the process never started.
    pub fn output(&self) -> &str {
        match &self.outcome {
            Outcome::Completed { stdout, .. } => stdout,
            Outcome::SpawnFailed { .. } => "",
        }
    }

    /// Captured stderr, or the spawn failure description.
    pub fn error(&self) -> &str {
        match &self.outcome {
            Outcome::Completed { stderr, .. } => stderr,
            Outcome::SpawnFailed { message, .. } => message,
        }
    }

    /// Check if any stdout was captured.
    pub fn has_output(&self) -> bool {
        !self.output().is_empty()
    }

    /// Check if any stderr (or failure text) was captured.
    pub fn has_error(&self) -> bool {
        !self.error().is_empty()
    }

    /// Captured stdout as an owned string.
    pub fn output_as_string(&self) -> String {
        self.output().to_owned()
    }

    /// Get output lines.
    pub fn output_lines(&self) -> impl Iterator<Item = &str> {
        self.output().lines()
    }

    /// Last non-empty line of the trimmed stdout.
    pub fn output_last_line(&self) -> Option<&str> {
        self.output()
            .trim()
            .lines()
            .last()
            .filter(|line| !line.is_empty())
    }

    /// Render command, output, error and exit code as a text block.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CommandExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "$ {}\n\n----- OUTPUT:\n{}\n\n----- ERROR:\n{}\n\n----- EXIT CODE: {}",
            self.command,
            self.output(),
            self.error(),
            self.exit_code()
        )
    }
}
