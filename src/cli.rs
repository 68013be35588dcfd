//! Command-line interface for cmd-runner.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Working directory for the command.
    pub dir: Option<PathBuf>,
    /// Child environment entries; when any are given they replace the
    /// inherited environment.
    pub env: Vec<(String, String)>,
    /// Run through the command interpreter instead of directly.
    pub shell: bool,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Print the execution as JSON.
    pub json: bool,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Command words, joined with spaces before execution.
    pub command: Vec<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Args {
    /// The command string to execute.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('d') | Long("dir") => {
                result.dir = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("env") => {
                let value: String = parser.value()?.parse()?;
                let (key, val) = value
                    .split_once('=')
                    .filter(|(key, _)| !key.is_empty())
                    .ok_or_else(|| ArgsError::InvalidValue("env", value.clone()))?;
                result.env.push((key.to_string(), val.to_string()));
            }
            Short('s') | Long("shell") => {
                result.shell = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('j') | Long("json") => {
                result.json = true;
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                // Everything from the first command word on belongs to the command
                result.command.push(val.string()?);
                for raw in parser.raw_args()? {
                    result.command.push(
                        raw.into_string()
                            .map_err(|raw| ArgsError::NonUnicode(raw.to_string_lossy().into()))?,
                    );
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"cmd-runner {version}
Run a command and capture its exit code, stdout and stderr

USAGE:
    cmd-runner [OPTIONS] [--] <COMMAND>...

OPTIONS:
    -d, --dir <DIR>         Working directory [default: current directory]
    -e, --env <KEY=VALUE>   Child environment entry (repeatable, replaces inherited env)
    -s, --shell             Run through the command interpreter
    -c, --config <FILE>     Path to configuration file (JSON)
    -j, --json              Print the execution as JSON
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    CMD_RUNNER_DIR            Working directory (overrides config)
    CMD_RUNNER_BYPASS_SHELL   true/false (overrides config)
    CMD_RUNNER_LOG_LEVEL      Log level (overrides config)
    RUST_LOG                  Alternative log level setting

EXAMPLES:
    # Run directly in the current directory
    cmd-runner git status

    # Run through the shell in another directory
    cmd-runner -s -d /tmp -- 'ls | wc -l'

    # Run with a minimal environment and JSON output
    cmd-runner -j -e PATH=/usr/bin -e LANG=C env
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("cmd-runner {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Command word that is not valid Unicode.
    NonUnicode(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::NonUnicode(arg) => {
                write!(f, "argument is not valid unicode: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
