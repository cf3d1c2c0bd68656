//! Declarative table of plugin options.
//!
//! Every option is declared once in [`OPTIONS`] with its name, the
//! environment variable it is bound to, its kind and its default. The same
//! table generates the command-line arguments ([`OptionSpec::to_arg`]) and
//! drives environment resolution ([`resolve`]), so the two surfaces cannot
//! drift apart.
//!
//! Resolution order for each option is: command-line override, then
//! environment variable, then default.

use std::collections::HashMap;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches};

use crate::environment::Environment;
use crate::error::PluginError;

use self::OptionKind::{Bool, Int, List, Str};

/// Type of value an option carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Free-form string; JSON payloads are strings at this level.
    Str,
    /// Comma-separated list in the environment, repeatable on the command line.
    List,
    /// Decimal integer.
    Int,
    /// Boolean; a bare flag on the command line.
    Bool,
}

impl OptionKind {
    fn expected(self) -> &'static str {
        match self {
            Self::Str => "a string",
            Self::List => "a comma-separated list",
            Self::Int => "an integer",
            Self::Bool => "a boolean",
        }
    }
}

/// Declaration of a single option.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub name: &'static str,
    pub env: &'static str,
    pub kind: OptionKind,
    /// Raw default, parsed with the same rules as an environment value.
    pub default: &'static str,
    pub help: &'static str,
}

pub const ACTIONS: &str = "actions";
pub const CA_CERT: &str = "ca_cert";
pub const ENV_FILE: &str = "env_file";
pub const INIT_OPTIONS: &str = "init_options";
pub const SUMMARIZE_OPTIONS: &str = "summarize_options";
pub const FMT_OPTIONS: &str = "fmt_options";
pub const PARALLELISM: &str = "parallelism";
pub const SKIP_INIT: &str = "skip_init";
pub const SKIP_CLEANUP: &str = "skip_cleanup";
pub const NETRC_MACHINE: &str = "netrc.machine";
pub const NETRC_USERNAME: &str = "netrc.username";
pub const NETRC_PASSWORD: &str = "netrc.password";
pub const ROLE_ARN_TO_ASSUME: &str = "role_arn_to_assume";
pub const ROOT_DIR: &str = "root_dir";
pub const SECRETS: &str = "secrets";
pub const SENSITIVE: &str = "sensitive";
pub const TARGETS: &str = "targets";
pub const TF_VERSION: &str = "tf.version";
pub const VARS: &str = "vars";
pub const VAR_FILES: &str = "var_files";
pub const TF_DATA_DIR: &str = "tf_data_dir";
pub const DISABLE_REFRESH: &str = "disable_refresh";

const fn opt(
    name: &'static str,
    env: &'static str,
    kind: OptionKind,
    default: &'static str,
    help: &'static str,
) -> OptionSpec {
    OptionSpec {
        name,
        env,
        kind,
        default,
        help,
    }
}

/// All options understood by the plugin.
#[rustfmt::skip]
pub const OPTIONS: &[OptionSpec] = &[
    opt(ACTIONS, "PLUGIN_ACTIONS", List, "validate,plan,apply",
        "a list of actions to have terraform perform"),
    opt(CA_CERT, "PLUGIN_CA_CERT", Str, "",
        "ca cert to add to your environment to allow terraform to use internal/private resources"),
    opt(ENV_FILE, "PLUGIN_ENV_FILE", Str, "",
        "pass filename to source it and load variables into the environment"),
    opt(INIT_OPTIONS, "PLUGIN_INIT_OPTIONS", Str, "",
        "JSON options for the init command"),
    opt(SUMMARIZE_OPTIONS, "PLUGIN_SUMMARIZE_OPTIONS", Str, "",
        "JSON options for the tf-summarize command"),
    opt(FMT_OPTIONS, "PLUGIN_FMT_OPTIONS", Str, "",
        "JSON options for the fmt command"),
    opt(PARALLELISM, "PLUGIN_PARALLELISM", Int, "0",
        "the number of concurrent operations as terraform walks its graph"),
    opt(SKIP_INIT, "PLUGIN_SKIP_INIT", Bool, "false",
        "skip terraform init (useful together with a restored cache)"),
    opt(SKIP_CLEANUP, "PLUGIN_SKIP_CLEANUP", Bool, "false",
        "skip removal of the terraform data directory after the run"),
    opt(NETRC_MACHINE, "DRONE_NETRC_MACHINE", Str, "", "netrc machine"),
    opt(NETRC_USERNAME, "DRONE_NETRC_USERNAME", Str, "", "netrc username"),
    opt(NETRC_PASSWORD, "DRONE_NETRC_PASSWORD", Str, "", "netrc password"),
    opt(ROLE_ARN_TO_ASSUME, "PLUGIN_ROLE_ARN_TO_ASSUME", Str, "",
        "a role to assume before running the terraform commands"),
    opt(ROOT_DIR, "PLUGIN_ROOT_DIR", Str, "",
        "the directory where the terraform files live, relative to the workspace"),
    opt(SECRETS, "PLUGIN_SECRETS", Str, "",
        "JSON map of terraform variable names to environment variables holding their values"),
    opt(SENSITIVE, "PLUGIN_SENSITIVE", Bool, "false",
        "whether or not to suppress echoing terraform commands"),
    opt(TARGETS, "PLUGIN_TARGETS", List, "", "targets to run apply or plan on"),
    opt(TF_VERSION, "PLUGIN_TF_VERSION", Str, "", "terraform version to install before running"),
    opt(VARS, "PLUGIN_VARS", Str, "",
        "JSON map of variables passed to plan and destroy as -var key=value"),
    opt(VAR_FILES, "PLUGIN_VAR_FILES", List, "",
        "a list of var files, each passed as -var-file <value>"),
    opt(TF_DATA_DIR, "PLUGIN_TF_DATA_DIR", Str, "",
        "where terraform keeps its per-working-directory data"),
    opt(DISABLE_REFRESH, "PLUGIN_DISABLE_REFRESH", Bool, "false",
        "whether or not to disable refreshing state before plan and apply"),
];

/// Looks up an option declaration by name.
pub fn spec(name: &str) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|s| s.name == name)
}

/// A typed option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Str(String),
    List(Vec<String>),
    Int(i64),
    Bool(bool),
}

impl OptionSpec {
    /// Builds the clap argument for this option.
    ///
    /// Environment binding is not delegated to clap: values
    /// come from the injected [`Environment`] instead.
    pub fn to_arg(&self) -> Arg {
        let arg = Arg::new(self.name)
            .long(self.name)
            .help(self.help)
            .help_heading("Plugin options");

        match self.kind {
            OptionKind::Str => arg.value_name("VALUE").action(ArgAction::Set),
            OptionKind::List => arg
                .value_name("ITEM")
                .value_delimiter(',')
                .action(ArgAction::Append),
            OptionKind::Int => arg
                .value_name("N")
                .value_parser(clap::value_parser!(i64))
                .action(ArgAction::Set),
            OptionKind::Bool => arg.action(ArgAction::SetTrue),
        }
    }

    /// Parses a raw string with the rules used for environment values.
    pub fn parse_raw(&self, raw: &str) -> Result<OptionValue, PluginError> {
        let invalid = || PluginError::InvalidValue {
            option: self.name.to_string(),
            value: raw.to_string(),
            expected: self.kind.expected(),
        };

        match self.kind {
            OptionKind::Str => Ok(OptionValue::Str(raw.to_string())),
            OptionKind::List => Ok(OptionValue::List(split_list(raw))),
            OptionKind::Int => raw.trim().parse().map(OptionValue::Int).map_err(|_| invalid()),
            OptionKind::Bool => parse_bool(raw.trim()).map(OptionValue::Bool).ok_or_else(invalid),
        }
    }

    fn default_value(&self) -> Result<OptionValue, PluginError> {
        self.parse_raw(self.default)
    }
}

/// Splits a comma-separated list, trimming items and dropping empty ones.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accepts the spellings CI systems commonly use for booleans.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    values: HashMap<&'static str, OptionValue>,
}

impl Overrides {
    /// Collects the plugin options that were set on the command line.
    ///
    /// Options that only carry clap defaults are ignored so that the
    /// environment still applies.
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let mut values = HashMap::new();
        for spec in OPTIONS {
            if matches.value_source(spec.name) != Some(ValueSource::CommandLine) {
                continue;
            }
            let value = match spec.kind {
                OptionKind::Str => matches.get_one::<String>(spec.name).cloned().map(OptionValue::Str),
                OptionKind::List => matches
                    .get_many::<String>(spec.name)
                    .map(|vals| {
                        OptionValue::List(
                            vals.map(|v| v.trim())
                                .filter(|v| !v.is_empty())
                                .map(str::to_string)
                                .collect(),
                        )
                    }),
                OptionKind::Int => matches.get_one::<i64>(spec.name).copied().map(OptionValue::Int),
                OptionKind::Bool => Some(OptionValue::Bool(matches.get_flag(spec.name))),
            };
            if let Some(value) = value {
                values.insert(spec.name, value);
            }
        }
        Self { values }
    }

    /// Sets an override directly.
    pub fn set(&mut self, name: &'static str, value: OptionValue) {
        self.values.insert(name, value);
    }

    fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }
}

/// Fully resolved option values, one per entry in [`OPTIONS`].
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    values: HashMap<&'static str, OptionValue>,
}

impl ResolvedOptions {
    /// Returns the string value of `name`, or empty if it is not a string option.
    pub fn string(&self, name: &str) -> String {
        match self.values.get(name) {
            Some(OptionValue::Str(s)) => s.clone(),
            _ => String::new(),
        }
    }

    pub fn list(&self, name: &str) -> Vec<String> {
        match self.values.get(name) {
            Some(OptionValue::List(v)) => v.clone(),
            _ => Vec::new(),
        }
    }

    pub fn int(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(OptionValue::Int(n)) => *n,
            _ => 0,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(OptionValue::Bool(true)))
    }
}

/// Resolves a single option.
pub fn resolve_one(
    spec: &OptionSpec,
    overrides: &Overrides,
    env: &Environment,
) -> Result<OptionValue, PluginError> {
    if let Some(value) = overrides.get(spec.name) {
        return Ok(value.clone());
    }
    match env.get_non_empty(spec.env) {
        Some(raw) => spec.parse_raw(raw),
        None => spec.default_value(),
    }
}

/// Resolves every option in [`OPTIONS`].
pub fn resolve(overrides: &Overrides, env: &Environment) -> Result<ResolvedOptions, PluginError> {
    let values = OPTIONS
        .iter()
        .map(|spec| resolve_one(spec, overrides, env).map(|v| (spec.name, v)))
        .collect::<Result<_, _>>()?;
    Ok(ResolvedOptions { values })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_names_are_unique() {
        for (i, a) in OPTIONS.iter().enumerate() {
            for b in &OPTIONS[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.env, b.env);
            }
        }
    }

    #[test]
    fn test_defaults_parse() {
        for spec in OPTIONS {
            spec.default_value()
                .unwrap_or_else(|e| panic!("default of {} does not parse: {}", spec.name, e));
        }
    }

    #[test]
    fn test_split_list_trims_and_drops_empty() {
        assert_eq!(split_list(" plan , apply,,"), vec!["plan", "apply"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_parse_bool_spellings() {
        for raw in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(raw), Some(true), "{}", raw);
        }
        for raw in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(raw), Some(false), "{}", raw);
        }
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn test_parse_raw_invalid_int() {
        let spec = spec(PARALLELISM).unwrap();
        let err = spec.parse_raw("four").unwrap_err();
        assert!(matches!(err, PluginError::InvalidValue { expected: "an integer", .. }));
    }

    #[test]
    fn test_override_beats_environment() {
        let env = Environment::from_pairs([("PLUGIN_PARALLELISM", "4")]);
        let mut overrides = Overrides::default();
        overrides.set(PARALLELISM, OptionValue::Int(8));

        let resolved = resolve(&overrides, &env).unwrap();
        assert_eq!(resolved.int(PARALLELISM), 8);
    }

    #[test]
    fn test_empty_environment_value_uses_default() {
        let env = Environment::from_pairs([("PLUGIN_ACTIONS", "")]);
        let resolved = resolve(&Overrides::default(), &env).unwrap();
        assert_eq!(resolved.list(ACTIONS), vec!["validate", "plan", "apply"]);
    }
}
