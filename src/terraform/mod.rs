//! Terraform command construction.
//!
//! [`Action`] names the steps a pipeline can request, and
//! [`TerraformCommands`] turns the plugin configuration into the concrete
//! command lines for each of them.

mod args;
pub mod install;

use std::collections::HashMap;
use std::str::FromStr;

use strum::{Display, EnumString};

pub use args::{CommandArgsBuilder, FlagValueStyle};

use crate::config::Config;
use crate::error::PluginError;
use crate::executor::CommandSpec;

/// Name of the terraform binary.
pub const TERRAFORM: &str = "terraform";
/// Name of the plan summarizer binary.
pub const TF_SUMMARIZE: &str = "tf-summarize";
/// Data directory terraform uses when `TF_DATA_DIR` is unset.
pub const DEFAULT_DATA_DIR: &str = ".terraform";

/// A terraform step requested through the action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Action {
    Fmt,
    Validate,
    Plan,
    PlanDestroy,
    Apply,
    Destroy,
    Summarize,
}

impl Action {
    /// Parses every entry, failing on the first unknown one.
    pub fn parse_all(actions: &[String]) -> Result<Vec<Action>, PluginError> {
        actions
            .iter()
            .map(|a| Action::from_str(a).map_err(|_| PluginError::InvalidAction(a.clone())))
            .collect()
    }
}

/// Returns the data directory terraform will use for this configuration.
pub fn data_dir(config: &Config) -> &str {
    if config.terraform_data_dir.is_empty() {
        DEFAULT_DATA_DIR
    } else {
        &config.terraform_data_dir
    }
}

/// Returns the path of the saved plan file.
///
/// Custom data directories get their own plan file so that several
/// configurations can share one working directory.
pub fn tfout_path(config: &Config) -> String {
    match data_dir(config) {
        DEFAULT_DATA_DIR => "plan.tfout".to_string(),
        dir => format!("{}.plan.tfout", dir),
    }
}

/// Builds terraform command lines from a [`Config`].
pub struct TerraformCommands<'a> {
    config: &'a Config,
}

impl<'a> TerraformCommands<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// `terraform version`
    pub fn version(&self) -> CommandSpec {
        CommandSpec::new(TERRAFORM, ["version"])
    }

    /// `terraform init`, never prompting for input.
    pub fn init(&self) -> CommandSpec {
        let opts = &self.config.init_options;
        let mut builder = CommandArgsBuilder::subcommand("init");
        builder.push_flag_values("-backend-config", &opts.backend_config, FlagValueStyle::Equals);
        self.push_lock_flags(&mut builder);
        builder.push_arg("-input=false");
        CommandSpec::new(TERRAFORM, builder.into_args())
    }

    /// `terraform get`
    pub fn get_modules(&self) -> CommandSpec {
        CommandSpec::new(TERRAFORM, ["get"])
    }

    /// Builds the command for a single action.
    pub fn for_action(&self, action: Action) -> CommandSpec {
        match action {
            Action::Fmt => self.fmt(),
            Action::Validate => CommandSpec::new(TERRAFORM, ["validate"]),
            Action::Plan => self.plan(false),
            Action::PlanDestroy => self.plan(true),
            Action::Apply => self.apply(),
            Action::Destroy => self.destroy(),
            Action::Summarize => self.summarize(),
        }
    }

    fn fmt(&self) -> CommandSpec {
        let opts = &self.config.fmt_options;
        let mut builder = CommandArgsBuilder::subcommand("fmt");
        builder.push_optional("-list", opts.list);
        builder.push_optional("-write", opts.write);
        builder.push_optional("-diff", opts.diff);
        builder.push_optional("-check", opts.check);
        CommandSpec::new(TERRAFORM, builder.into_args())
    }

    fn plan(&self, destroy: bool) -> CommandSpec {
        let mut builder = CommandArgsBuilder::subcommand("plan");
        if destroy {
            builder.push_arg("-destroy");
        } else {
            builder.push_arg(format!("-out={}", tfout_path(self.config)));
        }
        self.push_targets(&mut builder);
        self.push_variables(&mut builder);
        self.push_parallelism(&mut builder);
        self.push_lock_flags(&mut builder);
        self.push_refresh(&mut builder);
        CommandSpec::new(TERRAFORM, builder.into_args())
    }

    fn apply(&self) -> CommandSpec {
        let mut builder = CommandArgsBuilder::subcommand("apply");
        self.push_targets(&mut builder);
        self.push_parallelism(&mut builder);
        self.push_lock_flags(&mut builder);
        self.push_refresh(&mut builder);
        builder.push_arg(tfout_path(self.config));
        CommandSpec::new(TERRAFORM, builder.into_args())
    }

    fn destroy(&self) -> CommandSpec {
        let mut builder = CommandArgsBuilder::subcommand("destroy");
        self.push_targets(&mut builder);
        self.push_variables(&mut builder);
        self.push_parallelism(&mut builder);
        self.push_lock_flags(&mut builder);
        builder.push_arg("-auto-approve");
        CommandSpec::new(TERRAFORM, builder.into_args())
    }

    fn summarize(&self) -> CommandSpec {
        let opts = &self.config.summarize_options;
        let mut builder = CommandArgsBuilder::default();
        builder.push_switch("-tree", opts.tree);
        builder.push_switch("-separate-tree", opts.separate_tree);
        builder.push_switch("-draw", opts.draw);
        builder.push_switch("-md", opts.md);
        builder.push_switch("-json", opts.json);
        builder.push_switch("-html", opts.html);
        builder.push_flag_value("-out", &opts.out, FlagValueStyle::Equals);
        builder.push_arg(tfout_path(self.config));
        CommandSpec::new(TF_SUMMARIZE, builder.into_args())
    }

    fn push_targets(&self, builder: &mut CommandArgsBuilder) {
        builder.push_flag_values("--target", &self.config.targets, FlagValueStyle::Separate);
    }

    fn push_variables(&self, builder: &mut CommandArgsBuilder) {
        builder.push_flag_values("-var-file", &self.config.var_files, FlagValueStyle::Separate);
        if let Some(vars) = &self.config.vars {
            for pair in sorted_pairs(vars) {
                builder.push_flag_value("-var", &pair, FlagValueStyle::Separate);
            }
        }
    }

    fn push_parallelism(&self, builder: &mut CommandArgsBuilder) {
        if self.config.parallelism > 0 {
            builder.push_arg(format!("-parallelism={}", self.config.parallelism));
        }
    }

    fn push_lock_flags(&self, builder: &mut CommandArgsBuilder) {
        let opts = &self.config.init_options;
        builder.push_optional("-lock", opts.lock);
        builder.push_flag_value("-lock-timeout", &opts.lock_timeout, FlagValueStyle::Equals);
    }

    fn push_refresh(&self, builder: &mut CommandArgsBuilder) {
        if self.config.disable_refresh {
            builder.push_arg("-refresh=false");
        }
    }
}

fn sorted_pairs(vars: &HashMap<String, String>) -> Vec<String> {
    let mut pairs: Vec<_> = vars.iter().collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect()
}
