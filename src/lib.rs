pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod executor;
pub mod options;
pub mod plugin;
pub mod terraform;

pub use error::PluginError;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::environment::Environment;
use crate::executor::CommandExecutor;
use crate::options::Overrides;
use crate::plugin::ExecOptions;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Loads the configuration and runs the plugin.
///
/// The configuration is fully decoded before the executor sees any
/// command, so a malformed `vars` or `secrets` payload never reaches
/// terraform.
pub fn run(
    overrides: &Overrides,
    env: Environment,
    executor: &dyn CommandExecutor,
    opts: &ExecOptions,
) -> Result<()> {
    info!(revision = env!("CARGO_PKG_VERSION"), "terraform plugin version");

    let (plugin, env) = config::load(overrides, env).context("failed to load configuration")?;
    tracing::debug!("loaded configuration: {:?}", plugin);

    plugin.exec(&env, executor, opts)
}
