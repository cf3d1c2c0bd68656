use std::ffi::OsString;

use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::options::{OPTIONS, OptionSpec, Overrides};

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Set the log level
    #[arg(short, long, env = "PLUGIN_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Do not run, just show what would be done
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Represents log levels for controlling the verbosity of logging output.
///
/// Maps directly to the levels of the `tracing` crate. Note that child
/// process stdout is logged at `Info` and stderr at `Warn`, so levels above
/// `Info` hide terraform's own output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Parsed command line: ambient flags plus plugin option overrides.
#[derive(Debug)]
pub struct Invocation {
    pub cli: Cli,
    pub overrides: Overrides,
}

/// The full clap command, including one argument per plugin option.
pub fn command() -> clap::Command {
    Cli::command().args(OPTIONS.iter().map(OptionSpec::to_arg))
}

/// Parses the given arguments.
pub fn parse_from<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    let cli = Cli::from_arg_matches(&matches)?;
    Ok(Invocation {
        cli,
        overrides: Overrides::from_matches(&matches),
    })
}

/// Parses the process arguments, exiting with a usage message on error.
pub fn parse_args() -> Invocation {
    parse_from(std::env::args_os()).unwrap_or_else(|e| e.exit())
}
