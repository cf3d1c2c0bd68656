//! Plugin configuration and the loader that builds it.
//!
//! The loader resolves [`crate::options::OPTIONS`] against command-line
//! overrides and an [`Environment`], decodes the JSON-valued options and
//! assembles a [`Plugin`].
//!
//! Decoding is asymmetric:
//! - `vars` and `secrets` feed terraform variables directly, so a payload
//!   that is not a JSON object of strings aborts the run
//!   ([`PluginError::ConfigDecode`]).
//! - `init_options`, `fmt_options` and `summarize_options` only tune
//!   command flags; a malformed payload is logged and the record falls back
//!   to its default.

use std::collections::HashMap;

use camino::Utf8Path;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::environment::Environment;
use crate::error::PluginError;
use crate::options::{self, Overrides, ResolvedOptions};

/// Actions run when none are configured.
pub const DEFAULT_ACTIONS: [&str; 3] = ["validate", "plan", "apply"];

/// Options for `terraform init`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InitOptions {
    /// Each entry is passed as `-backend-config=<value>`.
    #[serde(rename = "backend-config")]
    pub backend_config: Vec<String>,
    /// Terraform locks by default, so only an explicit value is forwarded.
    pub lock: Option<bool>,
    #[serde(rename = "lock-timeout")]
    pub lock_timeout: String,
}

/// Options for `terraform fmt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FmtOptions {
    pub list: Option<bool>,
    pub write: Option<bool>,
    pub diff: Option<bool>,
    pub check: Option<bool>,
}

/// Options for `tf-summarize`, passed through as its own flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SummarizeOptions {
    pub tree: Option<bool>,
    #[serde(rename = "separate-tree")]
    pub separate_tree: Option<bool>,
    pub draw: Option<bool>,
    pub md: Option<bool>,
    pub json: Option<bool>,
    pub html: Option<bool>,
    /// Output file; empty means stdout.
    pub out: String,
}

/// Settings that shape the terraform commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub actions: Vec<String>,
    pub vars: Option<HashMap<String, String>>,
    /// Terraform variable name → name of the environment variable holding its value.
    pub secrets: Option<HashMap<String, String>>,
    pub init_options: InitOptions,
    pub fmt_options: FmtOptions,
    pub summarize_options: SummarizeOptions,
    pub cacert: String,
    pub sensitive: bool,
    pub role_arn: String,
    pub root_dir: String,
    pub skip_init: bool,
    pub skip_cleanup: bool,
    pub parallelism: i64,
    pub targets: Vec<String>,
    pub var_files: Vec<String>,
    pub terraform_data_dir: String,
    pub disable_refresh: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actions: DEFAULT_ACTIONS.iter().map(|a| a.to_string()).collect(),
            vars: None,
            secrets: None,
            init_options: InitOptions::default(),
            fmt_options: FmtOptions::default(),
            summarize_options: SummarizeOptions::default(),
            cacert: String::new(),
            sensitive: false,
            role_arn: String::new(),
            root_dir: String::new(),
            skip_init: false,
            skip_cleanup: false,
            parallelism: 0,
            targets: Vec::new(),
            var_files: Vec::new(),
            terraform_data_dir: String::new(),
            disable_refresh: false,
        }
    }
}

/// Credentials written to `~/.netrc` for fetching private modules.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Netrc {
    pub machine: String,
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for Netrc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Netrc")
            .field("machine", &self.machine)
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Terraform release selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Terraform {
    /// Release to install; empty uses whatever `terraform` is in PATH.
    pub version: String,
}

/// Everything a run needs, assembled once and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plugin {
    pub config: Config,
    pub netrc: Netrc,
    pub terraform: Terraform,
}

/// Decodes a JSON object of strings.
///
/// Empty input and JSON `null` mean "not configured" and yield `None`.
/// Anything else that is not an object with string values, including
/// arrays, is an error.
pub fn decode_string_map(
    option: &str,
    raw: &str,
) -> Result<Option<HashMap<String, String>>, PluginError> {
    if raw.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw)
        .map_err(|source| PluginError::ConfigDecode {
            option: option.to_string(),
            source,
        })
}

/// Decodes an options record, falling back to its default on any error.
pub fn decode_or_default<T>(option: &str, raw: &str) -> T
where
    T: DeserializeOwned + Default,
{
    if raw.is_empty() {
        return T::default();
    }
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("ignoring malformed {}: {}", option, e);
            T::default()
        }
    }
}

/// Loads the plugin configuration.
///
/// If `env_file` resolves to a path, that file is layered under `env`
/// first; a file that cannot be read is skipped. Returns the assembled
/// plugin together with the environment that was actually used.
pub fn load(
    overrides: &Overrides,
    mut env: Environment,
) -> Result<(Plugin, Environment), PluginError> {
    if let Some(spec) = options::spec(options::ENV_FILE) {
        if let options::OptionValue::Str(path) = options::resolve_one(spec, overrides, &env)? {
            if !path.is_empty() {
                match env.load_env_file(Utf8Path::new(&path)) {
                    Ok(count) => info!("loaded {} variable(s) from {}", count, path),
                    Err(e) => debug!("skipping env file: {}", e),
                }
            }
        }
    }

    let resolved = options::resolve(overrides, &env)?;
    let plugin = assemble(&resolved)?;
    Ok((plugin, env))
}

fn assemble(opts: &ResolvedOptions) -> Result<Plugin, PluginError> {
    use crate::options::*;

    let vars = decode_string_map(VARS, &opts.string(VARS))?;
    let secrets = decode_string_map(SECRETS, &opts.string(SECRETS))?;

    let config = Config {
        actions: opts.list(ACTIONS),
        vars,
        secrets,
        init_options: decode_or_default(INIT_OPTIONS, &opts.string(INIT_OPTIONS)),
        fmt_options: decode_or_default(FMT_OPTIONS, &opts.string(FMT_OPTIONS)),
        summarize_options: decode_or_default(SUMMARIZE_OPTIONS, &opts.string(SUMMARIZE_OPTIONS)),
        cacert: opts.string(CA_CERT),
        sensitive: opts.flag(SENSITIVE),
        role_arn: opts.string(ROLE_ARN_TO_ASSUME),
        root_dir: opts.string(ROOT_DIR),
        skip_init: opts.flag(SKIP_INIT),
        skip_cleanup: opts.flag(SKIP_CLEANUP),
        parallelism: opts.int(PARALLELISM),
        targets: opts.list(TARGETS),
        var_files: opts.list(VAR_FILES),
        terraform_data_dir: opts.string(TF_DATA_DIR),
        disable_refresh: opts.flag(DISABLE_REFRESH),
    };

    Ok(Plugin {
        config,
        netrc: Netrc {
            machine: opts.string(NETRC_MACHINE),
            login: opts.string(NETRC_USERNAME),
            password: opts.string(NETRC_PASSWORD),
        },
        terraform: Terraform {
            version: opts.string(TF_VERSION),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_string_map_empty_is_absent() {
        assert_eq!(decode_string_map("vars", "").unwrap(), None);
    }

    #[test]
    fn test_decode_string_map_null_is_absent() {
        assert_eq!(decode_string_map("vars", "null").unwrap(), None);
        assert_eq!(decode_string_map("secrets", " null ").unwrap(), None);
    }

    #[test]
    fn test_decode_string_map_rejects_array() {
        let err = decode_string_map("vars", "[]").unwrap_err();
        assert!(matches!(err, PluginError::ConfigDecode { ref option, .. } if option == "vars"));
    }

    #[test]
    fn test_decode_string_map_rejects_non_string_values() {
        assert!(decode_string_map("secrets", r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn test_decode_or_default_malformed() {
        let opts: FmtOptions = decode_or_default("fmt_options", "{not json");
        assert_eq!(opts, FmtOptions::default());
    }

    #[test]
    fn test_decode_or_default_wrong_shape() {
        let opts: InitOptions = decode_or_default("init_options", r#"{"lock": "sometimes"}"#);
        assert_eq!(opts, InitOptions::default());
    }

    #[test]
    fn test_init_options_field_names() {
        let opts: InitOptions = decode_or_default(
            "init_options",
            r#"{"backend-config": ["key=state.tfstate"], "lock": false, "lock-timeout": "30s"}"#,
        );
        assert_eq!(opts.backend_config, vec!["key=state.tfstate"]);
        assert_eq!(opts.lock, Some(false));
        assert_eq!(opts.lock_timeout, "30s");
    }

    #[test]
    fn test_summarize_options_ignores_unknown_keys() {
        let opts: SummarizeOptions =
            decode_or_default("summarize_options", r#"{"tree": true, "colour": "always"}"#);
        assert_eq!(opts.tree, Some(true));
        assert_eq!(opts.out, "");
    }

    #[test]
    fn test_netrc_debug_redacts_password() {
        let netrc = Netrc {
            machine: "github.com".to_string(),
            login: "octocat".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", netrc);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("github.com"));
    }
}
