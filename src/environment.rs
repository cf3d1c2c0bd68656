//! Snapshot of environment variables used as the configuration source.
//!
//! The plugin never reads the live process environment after start-up.
//! [`Environment::from_process`] captures it once; tests build one from
//! explicit pairs with [`Environment::from_pairs`]. Variables loaded from an
//! env-file are layered underneath and remembered so they can be exported
//! to the terraform child processes.

use std::collections::BTreeMap;

use camino::Utf8Path;
use tracing::debug;

use crate::error::PluginError;

/// Immutable name → raw value mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
    exported: Vec<(String, String)>,
}

impl Environment {
    /// Captures the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?, v.into_string().ok()?))
        }))
    }

    /// Builds an environment from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            exported: Vec::new(),
        }
    }

    /// Returns the raw value of `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Returns the value of `name` if it is set to something non-empty.
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    /// Iterates all variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Variables that came from an env-file and were not already set.
    ///
    /// These must be passed on to child processes, since they only
    /// exist in this snapshot and not in the real process environment.
    pub fn exported(&self) -> &[(String, String)] {
        &self.exported
    }

    /// Layers the contents of a dotenv-style file under this environment.
    ///
    /// The whole file is parsed before anything is applied, so a file with
    /// a bad line leaves the environment untouched. Variables that are
    /// already present keep their value. Returns the number of variables
    /// added.
    pub fn load_env_file(&mut self, path: &Utf8Path) -> Result<usize, PluginError> {
        let pairs = dotenvy::from_path_iter(path)
            .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
            .map_err(|e| env_file_error(path, e))?;

        let mut added = 0;
        for (key, value) in pairs {
            if self.vars.contains_key(&key) {
                debug!("env-file variable {} already set, keeping existing value", key);
                continue;
            }
            self.exported.push((key.clone(), value.clone()));
            self.vars.insert(key, value);
            added += 1;
        }

        Ok(added)
    }
}

fn env_file_error(path: &Utf8Path, err: dotenvy::Error) -> PluginError {
    match err {
        dotenvy::Error::Io(source) => PluginError::io(path.as_str(), source),
        other => PluginError::io(
            path.as_str(),
            std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        ),
    }
}
