use std::io;
use std::process;

use camino::Utf8PathBuf;
use clap_complete::generate;
use tracing::error;

use terraform_plugin::cli::{self, Commands};
use terraform_plugin::environment::Environment;
use terraform_plugin::executor::RealCommandExecutor;
use terraform_plugin::plugin::ExecOptions;
use terraform_plugin::{PluginError, init_logging, run};

fn main() {
    let invocation = cli::parse_args();

    if let Some(Commands::Completions(opts)) = &invocation.cli.command {
        let mut command = cli::command();
        let name = command.get_name().to_string();
        generate(opts.shell, &mut command, name, &mut io::stdout());
        return;
    }

    if let Err(e) = init_logging(invocation.cli.log_level) {
        eprintln!("{:#}", e);
        process::exit(1);
    }

    let work_dir = match std::env::current_dir()
        .map_err(|e| e.to_string())
        .and_then(|p| Utf8PathBuf::from_path_buf(p).map_err(|p| format!("non UTF-8 path: {:?}", p)))
    {
        Ok(dir) => dir,
        Err(e) => {
            error!("failed to determine working directory: {}", e);
            process::exit(1);
        }
    };

    let opts = ExecOptions {
        work_dir,
        home_dir: dirs::home_dir().and_then(|p| Utf8PathBuf::from_path_buf(p).ok()),
        dry_run: invocation.cli.dry_run,
    };
    let executor = RealCommandExecutor {
        dry_run: invocation.cli.dry_run,
    };

    if let Err(e) = run(&invocation.overrides, Environment::from_process(), &executor, &opts) {
        error!("{:#}", e);
        let code = e.downcast_ref::<PluginError>().map_or(1, PluginError::exit_code);
        process::exit(code);
    }
}
