//! Process runner.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, ExitStatus, Stdio};
use std::time::Instant;

use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use super::drain::{drain, ChildGuard};
use super::options::SpawnOptions;
use super::result::{CommandExecution, Outcome};
use crate::error::CmdRunnerError;
use crate::Result;

/// Exit code reported when the child ended without one (killed by a signal).
pub const NO_EXIT_CODE: i32 = -1;

/// Runs commands in a fixed directory and environment.
///
/// `execute` never fails: a command that cannot be started is reported
/// through [`Outcome::SpawnFailed`] on the returned [`CommandExecution`].
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    directory: PathBuf,
    env: Option<HashMap<String, String>>,
    options: SpawnOptions,
}

impl ProcessRunner {
    /// Create a runner.
    ///
    /// With `env` set to `None` the child inherits this process's
    /// environment; otherwise it sees exactly the given variables. Missing
    /// `options` default to bypassing the shell.
    pub fn new(
        directory: impl Into<PathBuf>,
        env: Option<HashMap<String, String>>,
        options: Option<SpawnOptions>,
    ) -> Self {
        Self {
            directory: directory.into(),
            env,
            options: options.unwrap_or_default(),
        }
    }

    /// Create a runner with inherited environment and default options.
    pub fn in_dir(directory: impl Into<PathBuf>) -> Self {
        Self::new(directory, None, None)
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Add multiple environment variables.
    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env = self.env.get_or_insert_with(HashMap::new);
        for (k, v) in vars {
            env.insert(k.into(), v.into());
        }
        self
    }

    /// Set the spawn options.
    pub fn with_options(mut self, options: SpawnOptions) -> Self {
        self.options = options;
        self
    }

    /// Working directory for spawned commands.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Child environment, or `None` to inherit this process's.
    pub fn env(&self) -> Option<&HashMap<String, String>> {
        self.env.as_ref()
    }

    /// Spawn options in effect.
    pub fn options(&self) -> SpawnOptions {
        self.options
    }

    /// Run `command` to completion and capture its output.
    ///
    /// Blocks until the child has exited and both of its output pipes are
    /// drained. There is no timeout.
    pub fn execute(&self, command: &str) -> CommandExecution {
        let start = Instant::now();
        debug!(command, directory = %self.directory.display(), "executing");

        let outcome = self.run(command).unwrap_or_else(|e| self.spawn_failed(e));
        self.finish(command, outcome, start)
    }

    /// Async variant of [`ProcessRunner::execute`] for use on a tokio runtime.
    pub async fn execute_async(&self, command: &str) -> CommandExecution {
        let start = Instant::now();
        debug!(command, directory = %self.directory.display(), "executing (async)");

        let outcome = match self.run_async(command).await {
            Ok(outcome) => outcome,
            Err(e) => self.spawn_failed(e),
        };
        self.finish(command, outcome, start)
    }

    fn finish(&self, command: &str, outcome: Outcome, start: Instant) -> CommandExecution {
        let execution = CommandExecution::new(command, &self.directory, outcome, start.elapsed());
        debug!(
            exit_code = execution.exit_code(),
            duration_ms = execution.duration().as_millis() as u64,
            "command finished"
        );
        execution
    }

    fn spawn_failed(&self, error: CmdRunnerError) -> Outcome {
        warn!(error = %error, "command could not be run");

        // Only the OS error may carry an error code; the message also
        // contains the caller's command and directory
        let cause = match &error {
            CmdRunnerError::Spawn { source, .. } | CmdRunnerError::Io(source) => {
                source.to_string()
            }
            _ => String::new(),
        };
        Outcome::spawn_failed(error.to_string(), &cause)
    }

    fn spawn_error(&self, command: &str, source: io::Error) -> CmdRunnerError {
        CmdRunnerError::Spawn {
            command: command.to_string(),
            directory: self.directory.clone(),
            source,
        }
    }

    /// Build the child command with all three standard streams piped.
    fn build_command(&self, command: &str) -> Result<StdCommand> {
        let mut cmd = if self.options.bypass_shell {
            let mut words = command.split_whitespace();
            let program = words.next().ok_or(CmdRunnerError::EmptyCommand)?;
            let mut cmd = StdCommand::new(program);
            cmd.args(words);
            cmd
        } else {
            shell_command(command)
        };

        cmd.current_dir(&self.directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(ref env) = self.env {
            cmd.env_clear().envs(env);
        }

        Ok(cmd)
    }

    fn run(&self, command: &str) -> Result<Outcome> {
        let child = self
            .build_command(command)?
            .spawn()
            .map_err(|e| self.spawn_error(command, e))?;

        let mut guard = ChildGuard::new(child);
        let child = guard.child_mut();
        debug!(pid = child.id(), "spawned");

        // Nothing is ever written; closing stdin lets readers of it see EOF
        drop(child.stdin.take());
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let captured = drain(stdout, stderr)?;
        let status = guard.wait()?;

        Ok(completed(status, &captured.stdout, &captured.stderr))
    }

    async fn run_async(&self, command: &str) -> Result<Outcome> {
        let mut cmd = tokio::process::Command::from(self.build_command(command)?);
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(command, e))?;
        debug!(pid = ?child.id(), "spawned");

        drop(child.stdin.take());
        let mut stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let mut out = Vec::new();
        let mut err = Vec::new();
        tokio::try_join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err))?;

        let status = child.wait().await?;
        Ok(completed(status, &out, &err))
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> StdCommand {
    let mut cmd = StdCommand::new("/bin/sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> StdCommand {
    use std::os::windows::process::CommandExt;

    let mut cmd = StdCommand::new("cmd.exe");
    cmd.arg("/C").raw_arg(command);
    cmd
}

fn missing_pipe(name: &str) -> io::Error {
    io::Error::other(format!("child {name} was not captured"))
}

fn completed(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Outcome {
    Outcome::Completed {
        exit_code: exit_code_of(status),
        stdout: String::from_utf8_lossy(stdout).into_owned(),
        stderr: String::from_utf8_lossy(stderr).into_owned(),
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            debug!(signal, "child terminated by signal");
        }
    }

    NO_EXIT_CODE
}

/// Run a command once in `directory` with default options.
pub fn execute_in(directory: impl Into<PathBuf>, command: &str) -> CommandExecution {
    ProcessRunner::in_dir(directory).execute(command)
}
