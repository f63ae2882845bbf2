//! CLI commands.

pub mod build;
pub mod config;
pub mod plugin;
pub mod preview;
pub mod prompt;
pub mod serve;
pub mod setup;
pub mod stop;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use quire_build::{BuildExecutor, OutputLayout, RuntimeResolver, Toolchain};
use quire_server::{ServerConfig, WatchTimings};

use config::ConfigFile;
use prompt::TerminalPrompt;

/// Everything a command needs from the command line and `quire.toml`.
pub struct Context {
    pub root: PathBuf,
    pub config: ConfigFile,
    pub verbose: bool,
    pub prompt: TerminalPrompt,
}

impl Context {
    pub fn load(root: &Path, config: &Path, verbose: bool, assume_yes: bool) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Project root not found: {}", root.display()))?;
        let config = config::load_config(&root.join(config))?;

        Ok(Self {
            root,
            config,
            verbose,
            prompt: TerminalPrompt::new(assume_yes),
        })
    }

    pub fn port(&self, flag: Option<u16>) -> u16 {
        flag.unwrap_or(self.config.server.port)
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.root)
    }

    pub fn resolver(&self) -> RuntimeResolver {
        RuntimeResolver::new(self.config.runtime.node_major)
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain::new(&self.root).with_version(&self.config.runtime.gitbook_cli_version)
    }

    pub fn timings(&self) -> WatchTimings {
        self.config.watch.timings()
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            livereload_port: self.config.server.livereload_port,
            log_requests: self.verbose,
            ..Default::default()
        }
    }

    /// Resolve the runtime and the installed gitbook binary.
    pub async fn executor(&self) -> Result<BuildExecutor> {
        let runtime = self.resolver().ensure_ready(&self.prompt).await?;
        let program = self.toolchain().require()?;

        Ok(BuildExecutor::new(self.layout(), program, runtime).with_verbose(self.verbose))
    }
}
