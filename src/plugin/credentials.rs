//! Credential preparation performed before terraform runs.
//!
//! - `~/.netrc` for fetching modules from private git hosts
//! - temporary AWS credentials obtained by assuming a role

use std::fs;

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Netrc;
use crate::error::PluginError;
use crate::executor::{CommandExecutor, CommandSpec};

/// AWS CLI binary used for role assumption; must be present in the image.
pub const AWS_CLI: &str = "aws";

/// Sets Unix file permissions on the given path.
#[cfg(unix)]
pub(crate) fn set_file_mode(path: &Utf8Path, mode: u32) -> Result<(), PluginError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| PluginError::io(format!("failed to set permissions on {}", path), e))
}

#[cfg(not(unix))]
pub(crate) fn set_file_mode(_path: &Utf8Path, _mode: u32) -> Result<(), PluginError> {
    Ok(())
}

/// Renders the netrc file contents.
pub fn netrc_contents(netrc: &Netrc) -> String {
    format!(
        "machine {}\nlogin {}\npassword {}\n",
        netrc.machine, netrc.login, netrc.password
    )
}

/// Writes `home/.netrc` when a machine is configured.
///
/// Returns whether a file was (or, in dry-run mode, would have been) written.
pub fn write_netrc(netrc: &Netrc, home: &Utf8Path, dry_run: bool) -> Result<bool, PluginError> {
    if netrc.machine.is_empty() {
        return Ok(false);
    }

    let path = home.join(".netrc");
    if dry_run {
        info!("dry run: would write netrc for {} to {}", netrc.machine, path);
        return Ok(true);
    }

    fs::write(&path, netrc_contents(netrc)).map_err(|e| PluginError::io(path.as_str(), e))?;
    set_file_mode(&path, 0o600)?;
    info!("wrote netrc for {} to {}", netrc.machine, path);
    Ok(true)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleOutput {
    credentials: AwsCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .finish()
    }
}

/// Parses `aws sts assume-role` JSON output into AWS environment variables.
pub fn parse_assume_role_output(output: &str) -> Result<Vec<(String, String)>, PluginError> {
    let parsed: AssumeRoleOutput = serde_json::from_str(output)
        .map_err(|e| PluginError::RoleAssumption(format!("unexpected sts response: {}", e)))?;
    let creds = parsed.credentials;
    Ok(vec![
        ("AWS_ACCESS_KEY_ID".to_string(), creds.access_key_id),
        ("AWS_SECRET_ACCESS_KEY".to_string(), creds.secret_access_key),
        ("AWS_SESSION_TOKEN".to_string(), creds.session_token),
    ])
}

/// Assumes `role_arn` with the AWS CLI and returns the resulting credentials
/// as environment variables for the terraform commands.
///
/// Requires the [`AWS_CLI`] binary in PATH; without it the run fails with
/// [`PluginError::CommandNotFound`] before any terraform command.
///
/// `base_env` is passed to the CLI so that credentials from an env-file can
/// be used to assume the role.
pub fn assume_role(
    role_arn: &str,
    base_env: &[(String, String)],
    executor: &dyn CommandExecutor,
    dry_run: bool,
) -> Result<Vec<(String, String)>> {
    let session_name = format!("terraform-plugin-{}", uuid::Uuid::new_v4().simple());
    let spec = CommandSpec::new(
        AWS_CLI,
        [
            "sts",
            "assume-role",
            "--role-arn",
            role_arn,
            "--role-session-name",
            session_name.as_str(),
            "--output",
            "json",
        ],
    )
    .with_envs(base_env.iter().cloned())
    .capturing_stdout();

    info!("assuming role {}", role_arn);
    let result = executor
        .execute(&spec)
        .with_context(|| format!("failed to assume role {}", role_arn))?;

    if !result.success() {
        return Err(PluginError::RoleAssumption(format!(
            "aws sts assume-role exited with {}",
            result
                .code()
                .map_or_else(|| "no exit code".to_string(), |c| c.to_string())
        ))
        .into());
    }

    match result.stdout {
        Some(output) => Ok(parse_assume_role_output(&output)?),
        None if dry_run => {
            warn!("dry run: continuing without assumed role credentials");
            Ok(Vec::new())
        }
        None => Err(PluginError::RoleAssumption("no output from aws sts".to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_netrc_contents() {
        let netrc = Netrc {
            machine: "github.com".to_string(),
            login: "octocat".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(netrc_contents(&netrc), "machine github.com\nlogin octocat\npassword secret\n");
    }

    #[test]
    fn test_parse_assume_role_output() {
        let output = r#"{
            "Credentials": {
                "AccessKeyId": "AKIA123",
                "SecretAccessKey": "shh",
                "SessionToken": "tok",
                "Expiration": "2026-10-17T12:00:00Z"
            },
            "AssumedRoleUser": {"Arn": "arn:aws:sts::123:assumed-role/ci/x"}
        }"#;
        let vars = parse_assume_role_output(output).unwrap();
        assert_eq!(
            vars,
            vec![
                ("AWS_ACCESS_KEY_ID".to_string(), "AKIA123".to_string()),
                ("AWS_SECRET_ACCESS_KEY".to_string(), "shh".to_string()),
                ("AWS_SESSION_TOKEN".to_string(), "tok".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_assume_role_output_missing_credentials() {
        let err = parse_assume_role_output("{}").unwrap_err();
        assert!(matches!(err, PluginError::RoleAssumption(_)));
    }
}
