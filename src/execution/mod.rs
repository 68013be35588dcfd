//! Command execution engine.
//!
//! This module provides:
//! - Spawning a command in a directory and environment
//! - Deadlock-free capture of stdout and stderr
//! - An inspectable result that records spawn failures instead of raising them
//!
//! # Example
//!
//! ```no_run
//! use cmd_runner::execution::{ProcessRunner, SpawnOptions};
//!
//! let runner = ProcessRunner::in_dir("/tmp");
//! let result = runner.execute("ls -la");
//! if result.ok() {
//!     println!("{}", result.output());
//! }
//!
//! // Through the command interpreter
//! let result = runner
//!     .clone()
//!     .with_options(SpawnOptions::shell())
//!     .execute("echo out; echo err >&2");
//! println!("{}", result.to_text());
//! ```

mod drain;
mod options;
mod result;
mod runner;

pub use options::SpawnOptions;
pub use result::{CommandExecution, Outcome, SPAWN_FAILURE_EXIT_CODE};
pub use runner::{execute_in, ProcessRunner, NO_EXIT_CODE};
