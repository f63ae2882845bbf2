//! The project-local gitbook-cli installation.

use std::path::{Path, PathBuf};

use crate::runtime::{EnvironmentError, RuntimeEnv};
use crate::shell::{self, OutputMode};
use crate::status::Progress;

/// gitbook-cli release installed by `setup`.
pub const GITBOOK_CLI_VERSION: &str = "2.3.2";

/// gitbook-cli installed under `<root>/.gitbook/cli`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    dir: PathBuf,
    version: String,
}

impl Toolchain {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join(".gitbook").join("cli"),
            version: GITBOOK_CLI_VERSION.to_string(),
        }
    }

    /// Install a different gitbook-cli release.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the gitbook binary.
    pub fn binary(&self) -> PathBuf {
        self.dir.join("node_modules").join(".bin").join("gitbook")
    }

    pub fn is_installed(&self) -> bool {
        self.binary().exists()
    }

    /// Fail with a remediation message unless installed.
    pub fn require(&self) -> Result<PathBuf, EnvironmentError> {
        if self.is_installed() {
            Ok(self.binary())
        } else {
            Err(EnvironmentError::ToolchainMissing)
        }
    }

    /// Install gitbook-cli with npm under the pinned runtime.
    pub async fn install(&self, runtime: &RuntimeEnv) -> Result<(), EnvironmentError> {
        let dir = shell::quote(&self.dir.to_string_lossy());
        let cmd = runtime.wrap(&format!(
            "mkdir -p {dir} && cd {dir} && npm init -y >/dev/null && npm install gitbook-cli@{} 2>&1",
            self.version
        ));

        let progress = Progress::start("Installing gitbook-cli...");
        match shell::run_checked(&cmd, None, OutputMode::Inherit).await {
            Ok(_) if self.is_installed() => {
                progress.succeed("gitbook-cli installed");
                Ok(())
            }
            Ok(_) => {
                progress.fail("gitbook-cli install finished without a gitbook binary");
                Err(EnvironmentError::ToolchainMissing)
            }
            Err(e) => {
                progress.fail("Failed to install gitbook-cli");
                Err(EnvironmentError::ToolchainInstall(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn binary_lives_under_project() {
        let toolchain = Toolchain::new(Path::new("/project"));
        assert_eq!(
            toolchain.binary(),
            PathBuf::from("/project/.gitbook/cli/node_modules/.bin/gitbook")
        );
    }

    #[test]
    fn require_reports_missing_toolchain() {
        let temp = tempdir().unwrap();
        let toolchain = Toolchain::new(temp.path());

        assert!(!toolchain.is_installed());
        assert!(matches!(
            toolchain.require(),
            Err(EnvironmentError::ToolchainMissing)
        ));
    }

    #[test]
    fn require_finds_installed_binary() {
        let temp = tempdir().unwrap();
        let toolchain = Toolchain::new(temp.path());
        let bin = toolchain.binary();
        fs::create_dir_all(bin.parent().unwrap()).unwrap();
        fs::write(&bin, "").unwrap();

        assert_eq!(toolchain.require().unwrap(), bin);
    }
}
