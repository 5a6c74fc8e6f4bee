mod cmd;
mod exit;
mod logging;
mod output;

use std::path::{Path, PathBuf};

use clap::Parser;
use gimlink_driver::CommandTable;

use crate::cmd::{Command, Context};
use crate::exit::{driver_error, CliResult};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "gimlink", version, about = "Camera gimbal protocol CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// JSON file overriding entries of the built-in command table.
    #[arg(long, value_name = "FILE", env = "GIMLINK_COMMANDS", global = true)]
    commands: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn load_commands(path: Option<&Path>) -> CliResult<CommandTable> {
    match path {
        Some(path) => CommandTable::from_json_file(path)
            .map_err(|err| driver_error("failed to load command table", err)),
        None => Ok(CommandTable::default()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let result = load_commands(cli.commands.as_deref()).and_then(|commands| {
        let ctx = Context {
            format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
            commands,
        };
        cmd::run(cli.command, &ctx)
    });

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
