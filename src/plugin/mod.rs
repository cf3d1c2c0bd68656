//! Execution of a loaded [`Plugin`].
//!
//! A run has two parts. Preparation installs the requested terraform
//! release, assumes the configured role and writes the netrc file. After
//! that, an ordered list of [`Step`]s is built up front and executed one by
//! one; the first failure stops the run.
//!
//! Step order:
//! 1. `terraform version`
//! 2. CA certificate installation, when configured
//! 3. data directory removal, `terraform init` and `terraform get`, unless init is skipped
//! 4. one command per action, in the configured order
//! 5. data directory removal, unless cleanup is skipped

pub mod credentials;

use std::fs;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tracing::{debug, info};

use crate::config::Plugin;
use crate::environment::Environment;
use crate::error::PluginError;
use crate::executor::{CommandExecutor, CommandSpec};
use crate::terraform::{self, Action, TerraformCommands, install};

/// Where `update-ca-certificates` picks up additional certificates.
pub const CA_CERT_PATH: &str = "/usr/local/share/ca-certificates/ca_cert.crt";

static TF_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^TF_VAR_(.+)$").expect("valid regex"));

/// Runtime settings that are not part of the plugin configuration.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Workspace directory; `root_dir` is resolved against it.
    pub work_dir: Utf8PathBuf,
    /// Where `.netrc` is written. `None` skips writing it.
    pub home_dir: Option<Utf8PathBuf>,
    /// Log commands instead of running them and skip every file write.
    pub dry_run: bool,
}

/// One unit of work in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Run an external command.
    Run(CommandSpec),
    /// Remove a directory tree; a missing directory is not an error.
    RemoveDir(Utf8PathBuf),
    /// Write a file with the given Unix mode.
    WriteFile {
        path: Utf8PathBuf,
        contents: String,
        mode: u32,
    },
}

impl Plugin {
    /// Runs the configured actions through `executor`.
    pub fn exec(
        &self,
        env: &Environment,
        executor: &dyn CommandExecutor,
        opts: &ExecOptions,
    ) -> Result<()> {
        let actions = Action::parse_all(&self.config.actions)?;

        if !self.terraform.version.is_empty() {
            install::install_terraform(&self.terraform.version, executor, opts.dry_run)
                .with_context(|| format!("failed to install terraform {}", self.terraform.version))?;
        }

        let mut child_env = self.child_env(env);
        if !self.config.role_arn.is_empty() {
            let creds = credentials::assume_role(
                &self.config.role_arn,
                &child_env,
                executor,
                opts.dry_run,
            )?;
            child_env.extend(creds);
        }

        if let Some(home) = &opts.home_dir {
            credentials::write_netrc(&self.netrc, home, opts.dry_run)?;
        }

        let steps = self.steps(&actions, &opts.work_dir, &child_env);
        info!("running {} step(s)", steps.len());
        for (index, step) in steps.iter().enumerate() {
            debug!("step {}/{}", index + 1, steps.len());
            self.run_step(step, executor, opts.dry_run)?;
        }

        info!("all steps completed successfully");
        Ok(())
    }

    /// Environment variables added to every command.
    ///
    /// Later entries win when a name repeats:
    /// 1. variables loaded from the env-file
    /// 2. lowercase copies of `TF_VAR_*` variables
    /// 3. `TF_VAR_<name>` for each secret, read from the referenced variable
    /// 4. `TF_DATA_DIR`, when a data directory is configured
    pub fn child_env(&self, env: &Environment) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = env.exported().to_vec();

        for (key, value) in env.iter() {
            if let Some(caps) = TF_VAR.captures(key) {
                let lower = caps[1].to_lowercase();
                if lower != caps[1] {
                    vars.push((format!("TF_VAR_{}", lower), value.to_string()));
                }
            }
        }

        if let Some(secrets) = &self.config.secrets {
            let mut names: Vec<_> = secrets.iter().collect();
            names.sort();
            for (name, source) in names {
                let value = env.get(source).unwrap_or_default();
                if value.is_empty() {
                    debug!("secret {} references unset variable {}", name, source);
                }
                vars.push((format!("TF_VAR_{}", name), value.to_string()));
            }
        }

        if !self.config.terraform_data_dir.is_empty() {
            vars.push(("TF_DATA_DIR".to_string(), self.config.terraform_data_dir.clone()));
        }

        vars
    }

    /// Directory the commands run in.
    pub fn command_dir(&self, work_dir: &Utf8Path) -> Utf8PathBuf {
        if self.config.root_dir.is_empty() {
            work_dir.to_path_buf()
        } else {
            work_dir.join(&self.config.root_dir)
        }
    }

    /// Builds the ordered step list for `actions`.
    pub fn steps(
        &self,
        actions: &[Action],
        work_dir: &Utf8Path,
        child_env: &[(String, String)],
    ) -> Vec<Step> {
        let dir = self.command_dir(work_dir);
        let data_dir = dir.join(terraform::data_dir(&self.config));
        let commands = TerraformCommands::new(&self.config);
        let prepare = |spec: CommandSpec| {
            Step::Run(
                spec.with_cwd(dir.clone())
                    .with_envs(child_env.iter().cloned())
                    .with_redacted_args(self.config.sensitive),
            )
        };

        let mut steps = vec![prepare(commands.version())];

        if !self.config.cacert.is_empty() {
            steps.push(Step::WriteFile {
                path: Utf8PathBuf::from(CA_CERT_PATH),
                contents: self.config.cacert.clone(),
                mode: 0o644,
            });
            steps.push(prepare(CommandSpec::new("update-ca-certificates", Vec::<String>::new())));
        }

        if !self.config.skip_init {
            steps.push(Step::RemoveDir(data_dir.clone()));
            steps.push(prepare(commands.init()));
            steps.push(prepare(commands.get_modules()));
        }

        steps.extend(actions.iter().map(|action| prepare(commands.for_action(*action))));

        if !self.config.skip_cleanup {
            steps.push(Step::RemoveDir(data_dir));
        }

        steps
    }

    fn run_step(&self, step: &Step, executor: &dyn CommandExecutor, dry_run: bool) -> Result<()> {
        match step {
            Step::Run(spec) => {
                if !self.config.sensitive {
                    info!("$ {}", spec.display());
                }
                let result = executor
                    .execute(spec)
                    .with_context(|| format!("failed to execute {}", spec.command))?;
                if !result.success() {
                    return Err(PluginError::Execution {
                        command: spec.display(),
                        code: result.code(),
                    }
                    .into());
                }
                debug!("command completed successfully");
            }
            Step::RemoveDir(path) => {
                if dry_run {
                    info!("dry run: would remove {}", path);
                } else {
                    remove_dir(path)?;
                }
            }
            Step::WriteFile {
                path,
                contents,
                mode,
            } => {
                if dry_run {
                    info!("dry run: would write {}", path);
                } else {
                    fs::write(path, contents).map_err(|e| PluginError::io(path.as_str(), e))?;
                    credentials::set_file_mode(path, *mode)?;
                    debug!("wrote {}", path);
                }
            }
        }
        Ok(())
    }
}

fn remove_dir(path: &Utf8Path) -> Result<(), PluginError> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("removed {}", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} does not exist, nothing to remove", path);
            Ok(())
        }
        Err(e) => Err(PluginError::io(format!("failed to remove {}", path), e)),
    }
}
