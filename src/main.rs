//! cmd-runner binary entry point.

use std::process::ExitCode;

use cmd_runner::cli::{self, Args};
use cmd_runner::config::Config;
use cmd_runner::{logging, CmdRunnerError};
use tracing::{debug, error};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run 'cmd-runner --help' for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> cmd_runner::Result<ExitCode> {
    let config = Config::load(args)?;
    let _ = logging::init_with_level(config.log_filter());

    debug!("cmd-runner v{}", env!("CARGO_PKG_VERSION"));

    if args.command.is_empty() {
        return Err(CmdRunnerError::EmptyCommand);
    }

    let execution = config.to_runner().execute(&args.command_line());

    if args.json {
        let json = serde_json::to_string_pretty(&execution)
            .map_err(|e| CmdRunnerError::Io(e.into()))?;
        println!("{}", json);
    } else {
        println!("{}", execution.to_text());
    }

    Ok(exit_code(execution.exit_code()))
}

/// Map a child exit code onto a process exit status.
fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::from(u8::MAX),
    }
}
