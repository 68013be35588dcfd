//! # cmd-runner
//!
//! Run an external command and capture its exit code, stdout and stderr.
//!
//! Both output pipes are drained together, so a child that writes large
//! amounts to stdout and stderr at once never deadlocks against its parent.
//! A command that cannot be started does not produce an error: the returned
//! [`CommandExecution`] records the failure with exit code
//! [`SPAWN_FAILURE_EXIT_CODE`] and the error text in place of stderr.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cmd_runner::ProcessRunner;
//!
//! cmd_runner::logging::try_init().ok();
//!
//! let result = ProcessRunner::in_dir(".").execute("git status --short");
//!
//! if result.ok() {
//!     println!("{}", result.output());
//! } else {
//!     eprintln!("exit {}: {}", result.exit_code(), result.error());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;

// Re-export commonly used types
pub use error::{CmdRunnerError, Result};
pub use execution::{
    execute_in, CommandExecution, Outcome, ProcessRunner, SpawnOptions, SPAWN_FAILURE_EXIT_CODE,
};
