//! Running gitbook builds and publishing their output.
//!
//! A build writes into the temp output directory. Only when it is classified as
//! successful is that directory swapped into place as the canonical output;
//! otherwise it is deleted and the diagnostic lines of the build output are
//! reported.

use std::future::{self, Future};
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::fsops::{self, FsError};
use crate::process::{BuildExit, BuildProcess, StopSignal};
use crate::runtime::RuntimeEnv;
use crate::shell::{self, ProcessError};
use crate::status::Progress;

/// Canonical output directory name under the project root.
pub const OUTPUT_DIR: &str = "_book";

/// Scratch directory the running build writes into.
pub const TEMP_OUTPUT_DIR: &str = "_book_temp";

/// Where the previous build is parked while the new one moves into place.
pub const STALE_OUTPUT_DIR: &str = "_book_stale";

/// Output fragments that mark a diagnostic line.
pub const DIAGNOSTIC_MARKERS: &[&str] = &[
    "Error:",
    "error:",
    "TypeError",
    "ENOENT",
    "Template render error",
];

/// Characters of output shown when no diagnostic line matches.
pub const OUTPUT_TAIL_CHARS: usize = 500;

/// Errors that prevent a build from running at all.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Filesystem(#[from] FsError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// The three output directories of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Project root; the build runs here
    pub root: PathBuf,
    /// Published output
    pub output: PathBuf,
    /// In-progress output
    pub temp: PathBuf,
    /// Previous output during a swap
    pub stale: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            output: root.join(OUTPUT_DIR),
            temp: root.join(TEMP_OUTPUT_DIR),
            stale: root.join(STALE_OUTPUT_DIR),
            root,
        }
    }
}

/// Result of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Output published
    Success,
    /// Build or swap failed; canonical output unchanged
    Failed { diagnostics: Vec<String> },
    /// Stopped because newer changes arrived
    Cancelled,
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Success)
    }

    /// Log the diagnostic lines of a failed build.
    pub fn log_diagnostics(&self) {
        if let BuildOutcome::Failed { diagnostics } = self {
            for line in diagnostics {
                tracing::error!("  {}", line);
            }
        }
    }
}

fn success_phrase() -> &'static Regex {
    static PHRASE: OnceLock<Regex> = OnceLock::new();
    PHRASE.get_or_init(|| {
        Regex::new(r"(?i)generation finished with success")
            .expect("success phrase pattern is valid")
    })
}

/// Whether a finished build counts as successful.
///
/// Exit code 0 is success. gitbook sometimes exits nonzero after a complete
/// build, so the phrase it prints on completion is also accepted and wins over
/// the exit code. This is a compatibility shim for that tool's output, not a
/// contract.
pub fn is_success(exit: &BuildExit) -> bool {
    exit.code == Some(0) || success_phrase().is_match(&exit.output)
}

/// Lines worth showing for a failed build.
///
/// Lines containing any of [`DIAGNOSTIC_MARKERS`], in output order. When none
/// match, the last [`OUTPUT_TAIL_CHARS`] characters of output as one entry.
pub fn diagnostics(output: &str) -> Vec<String> {
    let lines: Vec<String> = output
        .lines()
        .filter(|line| DIAGNOSTIC_MARKERS.iter().any(|m| line.contains(m)))
        .map(|line| line.trim_end().to_string())
        .collect();

    if !lines.is_empty() {
        return lines;
    }

    let tail = output_tail(output, OUTPUT_TAIL_CHARS).trim();
    if tail.is_empty() {
        Vec::new()
    } else {
        vec![tail.to_string()]
    }
}

fn output_tail(output: &str, chars: usize) -> &str {
    let count = output.chars().count();
    if count <= chars {
        return output;
    }
    let start = output
        .char_indices()
        .nth(count - chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &output[start..]
}

/// Runs the external gitbook binary and swaps its output into place.
#[derive(Debug, Clone)]
pub struct BuildExecutor {
    layout: OutputLayout,
    program: PathBuf,
    source_dir: PathBuf,
    runtime: RuntimeEnv,
    verbose: bool,
}

impl BuildExecutor {
    /// `program` is the gitbook binary; sources are the project root.
    pub fn new(layout: OutputLayout, program: impl Into<PathBuf>, runtime: RuntimeEnv) -> Self {
        Self {
            layout,
            program: program.into(),
            source_dir: PathBuf::from("."),
            runtime,
            verbose: false,
        }
    }

    /// Echo the full build output after every build.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Shell command for one build, wrapped for the runtime.
    pub fn command(&self) -> String {
        let raw = format!(
            "{} build {} {} 2>&1",
            shell::quote(&self.program.to_string_lossy()),
            shell::quote(&self.source_dir.to_string_lossy()),
            shell::quote(&self.layout.temp.to_string_lossy())
        );
        self.runtime.wrap(&raw)
    }

    /// Start a build in the background after clearing stale temp output.
    pub fn spawn(&self) -> Result<BuildProcess, BuildError> {
        fsops::remove_dir_if_exists(&self.layout.temp)?;

        let cmd = self.command();
        tracing::debug!("Build command: {}", cmd);

        Ok(BuildProcess::spawn(&cmd, &self.layout.root)?)
    }

    /// Classify a finished build and publish or discard its output.
    pub fn finish(&self, exit: &BuildExit) -> BuildOutcome {
        if self.verbose && !exit.output.is_empty() {
            tracing::info!("Build output:\n{}", exit.output.trim_end());
        }

        if is_success(exit) {
            let layout = &self.layout;
            match fsops::swap_into_place(&layout.temp, &layout.output, &layout.stale) {
                Ok(()) => return BuildOutcome::Success,
                Err(e) => tracing::error!("Failed to swap build output: {}", e),
            }
        }

        self.discard();
        BuildOutcome::Failed {
            diagnostics: diagnostics(&exit.output),
        }
    }

    /// Delete the temp output of an abandoned build.
    pub fn discard(&self) {
        fsops::cleanup_dir(&self.layout.temp);
    }

    /// Abandon a build whose process has been stopped.
    pub fn cancel(&self) -> BuildOutcome {
        self.discard();
        BuildOutcome::Cancelled
    }

    /// Run one build to completion, reporting progress.
    pub async fn execute(&self) -> Result<BuildOutcome, BuildError> {
        self.execute_until(future::pending()).await
    }

    /// Run one build, killing it if `stop` resolves first.
    ///
    /// A stopped build is reaped and its temp output removed before this
    /// returns `BuildOutcome::Cancelled`.
    pub async fn execute_until<F>(&self, stop: F) -> Result<BuildOutcome, BuildError>
    where
        F: Future<Output = ()>,
    {
        tracing::debug!("Build output: {}", self.layout.output.display());
        tracing::debug!("Temp output: {}", self.layout.temp.display());

        let progress = Progress::start("Building...");
        let mut process = match self.spawn() {
            Ok(process) => process,
            Err(e) => {
                progress.fail("Build process error");
                return Err(e);
            }
        };

        let exit = tokio::select! {
            exit = process.wait() => Some(exit),
            _ = stop => None,
        };

        let Some(exit) = exit else {
            process.signal(StopSignal::Kill);
            process.wait().await;
            progress.cancel("Build stopped");
            return Ok(self.cancel());
        };

        let outcome = self.finish(&exit);
        if outcome.is_success() {
            progress.succeed("Build complete");
        } else {
            progress.fail("Build failed");
            outcome.log_diagnostics();
        }

        Ok(outcome)
    }
}

/// Whether the canonical output directory holds a previous build.
pub fn has_output(layout: &OutputLayout) -> bool {
    layout.output.is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn exit(code: Option<i32>, output: &str) -> BuildExit {
        BuildExit {
            code,
            signal: None,
            output: output.to_string(),
        }
    }

    /// Writes a stand-in for the gitbook binary: `$3` is the output dir.
    fn fake_gitbook(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-gitbook");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn error_line_with_nonzero_exit_fails() {
        let result = exit(Some(2), "Error: something\nOK");

        assert!(!is_success(&result));
        assert_eq!(diagnostics(&result.output), vec!["Error: something"]);
    }

    #[test]
    fn success_phrase_overrides_exit_code() {
        let result = exit(Some(1), "info: ...Generation Finished With Success in 3.2s...");
        assert!(is_success(&result));
    }

    #[test]
    fn zero_exit_is_success() {
        assert!(is_success(&exit(Some(0), "")));
        assert!(!is_success(&exit(None, "")));
    }

    #[test]
    fn collects_every_marker() {
        let output = "start\nerror: a\nTypeError: b\nENOENT: c\nTemplate render error: d\nfine";
        assert_eq!(
            diagnostics(output),
            vec!["error: a", "TypeError: b", "ENOENT: c", "Template render error: d"]
        );
    }

    #[test]
    fn falls_back_to_output_tail() {
        let output = format!("{}END", "x".repeat(1000));
        let lines = diagnostics(&output);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].chars().count(), OUTPUT_TAIL_CHARS);
        assert!(lines[0].ends_with("END"));
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let output = "é".repeat(600);
        assert_eq!(output_tail(&output, 500).chars().count(), 500);
    }

    #[test]
    fn empty_output_has_no_diagnostics() {
        assert!(diagnostics("").is_empty());
    }

    #[test]
    fn layout_uses_sibling_dirs() {
        let layout = OutputLayout::new("/project");
        assert_eq!(layout.output, PathBuf::from("/project/_book"));
        assert_eq!(layout.temp, PathBuf::from("/project/_book_temp"));
        assert_eq!(layout.stale, PathBuf::from("/project/_book_stale"));
    }

    #[test]
    fn command_targets_temp_dir() {
        let executor = BuildExecutor::new(
            OutputLayout::new("/project"),
            "/project/.gitbook/cli/node_modules/.bin/gitbook",
            RuntimeEnv::Native,
        );

        assert_eq!(
            executor.command(),
            "\"/project/.gitbook/cli/node_modules/.bin/gitbook\" build \".\" \"/project/_book_temp\" 2>&1"
        );
    }

    #[tokio::test]
    async fn successful_build_is_published() {
        let temp = tempdir().unwrap();
        let program = fake_gitbook(
            temp.path(),
            "mkdir -p \"$3\" && echo new > \"$3/index.html\" && echo done",
        );
        let layout = OutputLayout::new(temp.path());
        fs::create_dir_all(&layout.output).unwrap();
        fs::write(layout.output.join("index.html"), "old").unwrap();

        let outcome = BuildExecutor::new(layout.clone(), program, RuntimeEnv::Native)
            .execute()
            .await
            .unwrap();

        assert_eq!(outcome, BuildOutcome::Success);
        assert_eq!(fs::read_to_string(layout.output.join("index.html")).unwrap(), "new\n");
        assert!(!layout.temp.exists());
    }

    #[tokio::test]
    async fn stopped_build_is_killed_and_discarded() {
        let temp = tempdir().unwrap();
        let program = fake_gitbook(
            temp.path(),
            "mkdir -p \"$3\" && sleep 2 && echo late > finished && echo done",
        );
        let layout = OutputLayout::new(temp.path());
        let executor = BuildExecutor::new(layout.clone(), program, RuntimeEnv::Native);

        let outcome = executor
            .execute_until(tokio::time::sleep(std::time::Duration::from_millis(300)))
            .await
            .unwrap();

        assert_eq!(outcome, BuildOutcome::Cancelled);
        assert!(!layout.temp.exists());
        assert!(!layout.output.exists());

        tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
        assert!(!temp.path().join("finished").exists());
    }

    #[test]
    fn cancel_removes_temp_output() {
        let temp = tempdir().unwrap();
        let layout = OutputLayout::new(temp.path());
        fs::create_dir_all(&layout.temp).unwrap();
        fs::write(layout.temp.join("index.html"), "partial").unwrap();

        let executor = BuildExecutor::new(layout.clone(), "gitbook", RuntimeEnv::Native);

        assert_eq!(executor.cancel(), BuildOutcome::Cancelled);
        assert!(!layout.temp.exists());
    }

    #[tokio::test]
    async fn phrase_with_nonzero_exit_is_published() {
        let temp = tempdir().unwrap();
        let program = fake_gitbook(
            temp.path(),
            "mkdir -p \"$3\" && echo 'generation finished with success' && exit 1",
        );
        let layout = OutputLayout::new(temp.path());

        let outcome = BuildExecutor::new(layout.clone(), program, RuntimeEnv::Native)
            .execute()
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert!(layout.output.is_dir());
    }

    #[tokio::test]
    async fn failed_build_keeps_previous_output() {
        let temp = tempdir().unwrap();
        let program = fake_gitbook(
            temp.path(),
            "mkdir -p \"$3\" && echo 'Error: bad page' >&2 && echo OK && exit 2",
        );
        let layout = OutputLayout::new(temp.path());
        fs::create_dir_all(&layout.output).unwrap();
        fs::write(layout.output.join("index.html"), "old").unwrap();

        let outcome = BuildExecutor::new(layout.clone(), program, RuntimeEnv::Native)
            .execute()
            .await
            .unwrap();

        assert_eq!(
            outcome,
            BuildOutcome::Failed {
                diagnostics: vec!["Error: bad page".to_string()]
            }
        );
        assert_eq!(fs::read_to_string(layout.output.join("index.html")).unwrap(), "old");
        assert!(!layout.temp.exists());
    }

    #[tokio::test]
    async fn success_without_output_dir_fails() {
        let temp = tempdir().unwrap();
        let program = fake_gitbook(temp.path(), "echo nothing written");
        let layout = OutputLayout::new(temp.path());
        fs::create_dir_all(&layout.output).unwrap();
        fs::write(layout.output.join("index.html"), "old").unwrap();

        let outcome = BuildExecutor::new(layout.clone(), program, RuntimeEnv::Native)
            .execute()
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert_eq!(fs::read_to_string(layout.output.join("index.html")).unwrap(), "old");
    }

    #[tokio::test]
    async fn spawn_clears_stale_temp_dir() {
        let temp = tempdir().unwrap();
        let program = fake_gitbook(temp.path(), "test -e \"$3/leftover\" && exit 9; exit 0");
        let layout = OutputLayout::new(temp.path());
        fs::create_dir_all(&layout.temp).unwrap();
        fs::write(layout.temp.join("leftover"), "").unwrap();

        let executor = BuildExecutor::new(layout.clone(), program, RuntimeEnv::Native);
        let exit = executor.spawn().unwrap().wait().await;

        assert_eq!(exit.code, Some(0));
    }

    #[test]
    fn has_output_checks_canonical_dir() {
        let temp = tempdir().unwrap();
        let layout = OutputLayout::new(temp.path());
        assert!(!has_output(&layout));

        fs::create_dir_all(&layout.output).unwrap();
        assert!(has_output(&layout));
    }
}
