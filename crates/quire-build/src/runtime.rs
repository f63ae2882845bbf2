//! Pinning the legacy Node.js runtime required by gitbook.
//!
//! The gitbook CLI only runs on Node.js 10. When that version is already active
//! commands run unmodified; otherwise nvm is located and every command is
//! prefixed with the sequence that activates the required version.

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::shell::{self, OutputMode, ProcessError};
use crate::status::Progress;

/// Node.js major version gitbook-cli runs on.
pub const REQUIRED_NODE_MAJOR: u32 = 10;

/// Install prefixes checked after `$NVM_DIR` and `~/.nvm`.
const KNOWN_NVM_PREFIXES: &[&str] = &["/usr/local/opt/nvm", "/opt/homebrew/opt/nvm"];

/// Fatal problems with the build environment.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error(
        "nvm is not installed. Install it with:\n\n  curl -o- https://raw.githubusercontent.com/nvm-sh/nvm/v0.39.0/install.sh | bash\n\nThen run: nvm install {major}"
    )]
    NvmMissing { major: u32 },

    #[error("Node.js v{major} is required. Run: nvm install {major}")]
    VersionDeclined { major: u32 },

    #[error("Failed to install Node.js v{major}: {source}. Run manually: nvm install {major}")]
    InstallFailed {
        major: u32,
        #[source]
        source: ProcessError,
    },

    #[error("gitbook-cli is not installed. Run `quire setup` first.")]
    ToolchainMissing,

    #[error("Failed to install gitbook-cli: {0}")]
    ToolchainInstall(#[source] ProcessError),
}

/// Answers yes/no questions during environment setup.
pub trait Confirm: Send + Sync {
    fn confirm(&self, question: &str) -> bool;
}

/// Always answers the same way. Used for non-interactive runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _question: &str) -> bool {
        self.0
    }
}

/// Location of an nvm installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvmInstall {
    /// Value for `NVM_DIR`
    pub dir: PathBuf,
    /// Path to `nvm.sh`
    pub script: PathBuf,
}

impl NvmInstall {
    fn at(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            script: dir.join("nvm.sh"),
        }
    }

    /// Shell fragment that loads nvm into the current shell.
    fn source_prefix(&self) -> String {
        format!(
            "export NVM_DIR={} && . {}",
            shell::quote(&self.dir.to_string_lossy()),
            shell::quote(&self.script.to_string_lossy())
        )
    }
}

/// The environment external commands run in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEnv {
    /// The active interpreter already matches
    Native,
    /// Switch versions through nvm before each command
    Nvm { install: NvmInstall, major: u32 },
}

impl RuntimeEnv {
    /// Prefix a raw shell command with the activation sequence, if any.
    pub fn wrap(&self, cmd: &str) -> String {
        match self {
            RuntimeEnv::Native => cmd.to_string(),
            RuntimeEnv::Nvm { install, major } => format!(
                "unset npm_config_prefix && {} && nvm use {} 2>/dev/null && {}",
                install.source_prefix(),
                major,
                cmd
            ),
        }
    }
}

/// Selects the runtime for gitbook commands.
#[derive(Debug, Clone)]
pub struct RuntimeResolver {
    required_major: u32,
}

impl Default for RuntimeResolver {
    fn default() -> Self {
        Self::new(REQUIRED_NODE_MAJOR)
    }
}

impl RuntimeResolver {
    pub fn new(required_major: u32) -> Self {
        Self { required_major }
    }

    pub fn required_major(&self) -> u32 {
        self.required_major
    }

    /// Make sure the required runtime is usable, installing it through nvm
    /// after confirmation when it is missing.
    pub async fn ensure_ready(
        &self,
        prompt: &dyn Confirm,
    ) -> Result<RuntimeEnv, EnvironmentError> {
        let major = self.required_major;
        let current = active_node_major().await;

        if current == Some(major) {
            info!("✓ Node.js v{} is already active", major);
            return Ok(RuntimeEnv::Native);
        }

        warn!(
            "gitbook-cli requires Node.js v{}.x (current: {})",
            major,
            current
                .map(|v| format!("v{}", v))
                .unwrap_or_else(|| "none".to_string())
        );

        let install = find_nvm().await.ok_or(EnvironmentError::NvmMissing { major })?;
        debug!("Using nvm from {}", install.dir.display());

        if !version_installed(&install, major).await {
            warn!("Node.js v{} is not installed.", major);
            if !prompt.confirm(&format!("Install Node.js v{} via nvm?", major)) {
                return Err(EnvironmentError::VersionDeclined { major });
            }
            install_version(&install, major).await?;
        }

        info!("Using nvm to switch to Node.js v{}...", major);
        Ok(RuntimeEnv::Nvm { install, major })
    }
}

/// Major version of the `node` on `PATH`, if any.
async fn active_node_major() -> Option<u32> {
    let out = shell::run("node -v", None, OutputMode::Capture).await.ok()?;
    if !out.success() {
        return None;
    }
    parse_major(&out.output)
}

/// Parse the major component of `v10.24.1`.
pub fn parse_major(version: &str) -> Option<u32> {
    version
        .trim()
        .trim_start_matches('v')
        .split('.')
        .next()?
        .parse()
        .ok()
}

/// nvm directories to check, in priority order.
pub fn nvm_candidates(nvm_dir: Option<PathBuf>, home: Option<PathBuf>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = nvm_dir {
        candidates.push(dir);
    }
    if let Some(home) = home {
        candidates.push(home.join(".nvm"));
    }
    candidates.extend(KNOWN_NVM_PREFIXES.iter().map(PathBuf::from));
    candidates
}

/// First candidate that actually contains `nvm.sh`.
pub fn locate_nvm(candidates: &[PathBuf]) -> Option<NvmInstall> {
    candidates
        .iter()
        .map(|dir| NvmInstall::at(dir))
        .find(|install| install.script.is_file())
}

async fn find_nvm() -> Option<NvmInstall> {
    let nvm_dir = env::var_os("NVM_DIR").map(PathBuf::from);
    let mut candidates = nvm_candidates(nvm_dir, dirs::home_dir());

    // Homebrew can live anywhere, so ask it last.
    if let Ok(out) = shell::run("brew --prefix nvm", None, OutputMode::Capture).await {
        let prefix = out.output.lines().next().unwrap_or("").trim();
        if out.success() && !prefix.is_empty() {
            candidates.push(PathBuf::from(prefix));
        }
    }

    locate_nvm(&candidates)
}

async fn version_installed(install: &NvmInstall, major: u32) -> bool {
    let cmd = format!(
        "{} && nvm ls {} 2>/dev/null | grep -q \"v{}\"",
        install.source_prefix(),
        major,
        major
    );
    matches!(
        shell::run(&cmd, None, OutputMode::Capture).await,
        Ok(out) if out.success()
    )
}

async fn install_version(install: &NvmInstall, major: u32) -> Result<(), EnvironmentError> {
    let progress = Progress::start(format!("Installing Node.js v{} via nvm...", major));
    let cmd = format!("{} && nvm install {} 2>&1", install.source_prefix(), major);

    match shell::run_checked(&cmd, None, OutputMode::Capture).await {
        Ok(_) => {
            progress.succeed(&format!("Node.js v{} installed", major));
            Ok(())
        }
        Err(source) => {
            progress.fail(&format!("Failed to install Node.js v{}", major));
            Err(EnvironmentError::InstallFailed { major, source })
        }
    }
}
