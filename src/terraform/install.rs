//! Installation of a pinned terraform release.
//!
//! The release archive is fetched from the HashiCorp release server and
//! unpacked with `unzip` into the binary directory, replacing whatever
//! `terraform` the image shipped with.

use std::fs;
use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;
use url::Url;

use crate::error::PluginError;
use crate::executor::{CommandExecutor, CommandSpec};
use crate::options;

/// Archive tool used to unpack releases; must be present in the image.
pub const UNZIP: &str = "unzip";

const RELEASES_URL: &str = "https://releases.hashicorp.com/terraform/";
const INSTALL_DIR: &str = "/bin";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Maps a Rust target OS name to the release naming scheme.
fn release_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

/// Maps a Rust target architecture to the release naming scheme.
fn release_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        other => other,
    }
}

/// Rejects versions that could escape the release or temp directory.
fn check_version(version: &str) -> Result<&str, PluginError> {
    let trimmed = version.trim_start_matches('v');
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) || trimmed.contains("..") {
        return Err(PluginError::InvalidValue {
            option: options::TF_VERSION.to_string(),
            value: version.to_string(),
            expected: "a release version such as 1.5.7",
        });
    }
    Ok(trimmed)
}

/// Returns the download URL of a terraform release for the given platform.
pub fn release_url(version: &str, os: &str, arch: &str) -> Result<Url, PluginError> {
    let version = check_version(version)?;
    let file = format!(
        "terraform_{v}_{os}_{arch}.zip",
        v = version,
        os = release_os(os),
        arch = release_arch(arch)
    );
    Url::parse(RELEASES_URL)
        .and_then(|base| base.join(&format!("{}/{}", version, file)))
        .map_err(|e| PluginError::Download {
            url: format!("{}{}/{}", RELEASES_URL, version, file),
            reason: e.to_string(),
        })
}

/// Downloads `url` into `dest`.
fn download(url: &Url, dest: &Utf8Path) -> Result<(), PluginError> {
    let failed = |reason: String| PluginError::Download {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| failed(format!("failed to create HTTP client: {}", e)))?;

    let mut response = client
        .get(url.clone())
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| failed(e.to_string()))?;

    let mut file = fs::File::create(dest).map_err(|e| PluginError::io(dest.as_str(), e))?;
    io::copy(&mut response, &mut file).map_err(|e| PluginError::io(dest.as_str(), e))?;
    Ok(())
}

/// Installs terraform `version` into the binary directory.
///
/// Requires the [`UNZIP`] binary in PATH; without it the run fails with
/// [`PluginError::CommandNotFound`] after the download.
///
/// In dry-run mode nothing is downloaded; the unzip command is still
/// handed to the executor so it shows up in the dry-run log.
pub fn install_terraform(
    version: &str,
    executor: &dyn CommandExecutor,
    dry_run: bool,
) -> Result<()> {
    let url = release_url(version, std::env::consts::OS, std::env::consts::ARCH)?;
    let version = check_version(version)?;
    let archive = Utf8PathBuf::from_path_buf(std::env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
        .join(format!("terraform_{}.zip", version));

    info!("installing terraform {} from {}", version, url);
    if !dry_run {
        download(&url, &archive)?;
    }

    let spec = CommandSpec::new(UNZIP, ["-o", archive.as_str(), "-d", INSTALL_DIR]);
    let result = executor
        .execute(&spec)
        .with_context(|| format!("failed to unpack {}", archive))?;

    if !dry_run {
        if let Err(e) = fs::remove_file(&archive) {
            tracing::debug!("failed to remove {}: {}", archive, e);
        }
    }

    if !result.success() {
        return Err(PluginError::Execution {
            command: spec.display(),
            code: result.code(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_url_linux_amd64() {
        let url = release_url("1.5.7", "linux", "x86_64").unwrap();
        assert_eq!(
            url.as_str(),
            "https://releases.hashicorp.com/terraform/1.5.7/terraform_1.5.7_linux_amd64.zip"
        );
    }

    #[test]
    fn test_release_url_strips_v_prefix() {
        let url = release_url("v1.9.0", "macos", "aarch64").unwrap();
        assert_eq!(
            url.as_str(),
            "https://releases.hashicorp.com/terraform/1.9.0/terraform_1.9.0_darwin_arm64.zip"
        );
    }

    #[test]
    fn test_release_url_rejects_path_like_versions() {
        for version in ["../x", "1.5.7/../../etc", "..", "v", "", "1\\2"] {
            let err = release_url(version, "linux", "x86_64").unwrap_err();
            assert!(
                matches!(err, PluginError::InvalidValue { ref option, .. } if option == "tf.version"),
                "accepted {:?}",
                version
            );
        }
    }

    #[test]
    fn test_install_rejects_path_like_version_before_running_anything() {
        struct NoCalls;
        impl CommandExecutor for NoCalls {
            fn execute(&self, spec: &CommandSpec) -> Result<crate::executor::ExecutionResult> {
                panic!("unexpected command: {}", spec.display());
            }
        }

        let err = install_terraform("../../evil", &NoCalls, true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PluginError>(),
            Some(PluginError::InvalidValue { .. })
        ));
    }
}
