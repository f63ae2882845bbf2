//! Drives the watch/rebuild state machine against real processes, timers, the
//! file watcher and the static server.
//!
//! Everything runs on one task: each loop iteration waits for the next event
//! (file change, build exit, timer, shutdown), feeds it to [`BuildMachine`] and
//! carries out the returned actions before polling again.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use quire_build::{
    format_files, has_output, BuildError, BuildExecutor, BuildExit, BuildOutcome, BuildProcess,
    Confirm, Progress, StopSignal,
};

use crate::machine::{Action, BuildMachine, BuildState, Event, TimerKind, WatchTimings};
use crate::server::{ServerConfig, ServerError, StaticServer, DEFAULT_PORT};
use crate::watcher::{FileWatcher, WatchError, WatchFilter};

/// Errors that end a serve session.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Initial build failed")]
    InitialBuildFailed,

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Configuration for a serve session.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Port for the static server
    pub port: u16,

    /// Debounce, cancel grace and kill timeout
    pub timings: WatchTimings,

    /// Static server settings
    pub server: ServerConfig,

    /// Open a browser once serving
    pub open: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timings: WatchTimings::default(),
            server: ServerConfig::default(),
            open: false,
        }
    }
}

/// A running build and its status line.
struct ActiveBuild {
    process: BuildProcess,
    progress: Progress,
}

/// Deadlines for the three state machine timers.
#[derive(Debug, Default)]
struct Timers {
    debounce: Option<Instant>,
    cancel_grace: Option<Instant>,
    kill_deadline: Option<Instant>,
}

impl Timers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<Instant> {
        match kind {
            TimerKind::Debounce => &mut self.debounce,
            TimerKind::CancelGrace => &mut self.cancel_grace,
            TimerKind::KillDeadline => &mut self.kill_deadline,
        }
    }

    /// (Re)start a timer from now.
    fn arm(&mut self, kind: TimerKind, after: Duration) {
        *self.slot(kind) = Some(Instant::now() + after);
    }

    fn disarm(&mut self, kind: TimerKind) {
        *self.slot(kind) = None;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

async fn elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn exited(build: &mut Option<ActiveBuild>) -> BuildExit {
    match build {
        Some(active) => active.process.wait().await,
        None => std::future::pending().await,
    }
}

/// Watches sources, rebuilds on change and serves the output.
pub struct BuildManager {
    executor: BuildExecutor,
    filter: WatchFilter,
    config: ManagerConfig,
    machine: BuildMachine,
    server: StaticServer,
    build: Option<ActiveBuild>,
    timers: Timers,
}

impl BuildManager {
    pub fn new(executor: BuildExecutor, filter: WatchFilter, config: ManagerConfig) -> Self {
        Self {
            machine: BuildMachine::new(config.timings),
            server: StaticServer::new(config.server.clone()),
            executor,
            filter,
            config,
            build: None,
            timers: Timers::default(),
        }
    }

    pub fn state(&self) -> BuildState {
        self.machine.state()
    }

    /// Build if needed, then serve and rebuild on change until `shutdown`
    /// resolves.
    ///
    /// When output from an earlier run exists, `prompt` decides whether to
    /// rebuild before serving. A failing initial build ends the session.
    pub async fn run<F>(mut self, prompt: &dyn Confirm, shutdown: F) -> Result<(), ManagerError>
    where
        F: Future<Output = ()>,
    {
        let layout = self.executor.layout().clone();
        debug!("Project: {}", layout.root.display());
        debug!("Book: {}", layout.output.display());
        debug!("Port: {}", self.config.port);

        self.executor.discard();
        tokio::pin!(shutdown);

        let rebuild = if has_output(&layout) {
            info!("Using existing _book...");
            prompt.confirm("Rebuild before starting?")
        } else {
            true
        };

        if rebuild {
            match self.executor.execute_until(&mut shutdown).await? {
                BuildOutcome::Success => {}
                BuildOutcome::Cancelled => {
                    info!("Stopped");
                    return Ok(());
                }
                BuildOutcome::Failed { .. } => return Err(ManagerError::InitialBuildFailed),
            }
        }

        let addr = self.server.start(&layout.output, self.config.port).await?;
        if self.config.open {
            let url = format!("http://{}", addr);
            if let Err(e) = open::that(&url) {
                debug!("Could not open browser: {}", e);
            }
        }

        let (watcher, changes) = FileWatcher::new(self.filter.clone())?;
        info!("Watching...");

        self.watch(changes, &mut shutdown).await;

        drop(watcher);
        self.shutdown().await;
        Ok(())
    }

    /// Event loop: one event at a time, in arrival order.
    async fn watch<F>(&mut self, mut changes: mpsc::UnboundedReceiver<String>, shutdown: &mut F)
    where
        F: Future<Output = ()> + Unpin,
    {
        loop {
            let event = tokio::select! {
                biased;
                _ = &mut *shutdown => break,
                exit = exited(&mut self.build) => Event::BuildExited(exit),
                _ = elapsed(self.timers.kill_deadline) => {
                    Event::TimerElapsed(TimerKind::KillDeadline)
                }
                _ = elapsed(self.timers.cancel_grace) => {
                    Event::TimerElapsed(TimerKind::CancelGrace)
                }
                _ = elapsed(self.timers.debounce) => Event::TimerElapsed(TimerKind::Debounce),
                change = changes.recv() => match change {
                    Some(path) => Event::FileChanged(path),
                    None => {
                        warn!("File watcher stopped");
                        break;
                    }
                },
            };
            self.dispatch(event);
        }
    }

    /// Feed an event to the machine and carry out the resulting actions.
    fn dispatch(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let mut finished = None;
            match &event {
                Event::TimerElapsed(kind) => self.timers.disarm(*kind),
                Event::BuildExited(_) => finished = self.build.take(),
                Event::FileChanged(path) if self.machine.state() != BuildState::Idle => {
                    if !self.machine.pending().contains(path) {
                        debug!("Queued: {}", path);
                    }
                }
                _ => {}
            }

            for action in self.machine.handle(event) {
                match action {
                    Action::Arm(kind, after) => self.timers.arm(kind, after),
                    Action::Disarm(kind) => self.timers.disarm(kind),
                    Action::StartBuild(files) => {
                        if !self.start_build(&files) {
                            queue.push_back(Event::SpawnFailed);
                        }
                    }
                    Action::Terminate => self.signal_build(StopSignal::Terminate),
                    Action::Kill => self.signal_build(StopSignal::Kill),
                    Action::Publish(exit) => {
                        let outcome = self.executor.finish(&exit);
                        if let Some(active) = finished.take() {
                            report(active.progress, &outcome);
                        }
                    }
                    Action::Discard => {
                        let outcome = self.executor.cancel();
                        if let Some(active) = finished.take() {
                            report(active.progress, &outcome);
                        }
                    }
                }
            }
        }
    }

    /// Launch a build; `false` when the process could not be started.
    fn start_build(&mut self, files: &[String]) -> bool {
        debug_assert!(self.build.is_none(), "a build is already running");

        let message = if files.is_empty() {
            "Rebuilding...".to_string()
        } else {
            format!("Rebuilding ({})...", format_files(files))
        };
        let progress = Progress::start(message);

        match self.executor.spawn() {
            Ok(process) => {
                self.build = Some(ActiveBuild { process, progress });
                true
            }
            Err(e) => {
                progress.fail(&format!("Build process error: {}", e));
                self.executor.discard();
                false
            }
        }
    }

    fn signal_build(&self, signal: StopSignal) {
        if let Some(active) = &self.build {
            debug!("Sending {:?} to build", signal);
            active.process.signal(signal);
        }
    }

    /// Tear everything down on exit.
    async fn shutdown(&mut self) {
        self.timers.clear();
        if let Some(mut active) = self.build.take() {
            active.process.signal(StopSignal::Kill);
            active.process.wait().await;
            active.progress.cancel("Rebuild stopped");
        }
        self.server.stop().await;
        if self.config.server.reap_ports {
            quire_build::reap_server_ports(self.config.port, self.config.server.livereload_port)
                .await;
        }
        self.executor.discard();
        info!("Stopped");
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutting down...");
}

fn report(progress: Progress, outcome: &BuildOutcome) {
    match outcome {
        BuildOutcome::Success => progress.succeed("Rebuild complete"),
        BuildOutcome::Cancelled => progress.cancel("Rebuild cancelled, newer changes queued"),
        BuildOutcome::Failed { .. } => {
            progress.fail("Rebuild failed");
            outcome.log_diagnostics();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_build::{FixedAnswer, OutputLayout, RuntimeEnv};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    /// Fake gitbook: writes the number of builds so far into `index.html`,
    /// sleeping `delay` seconds first. Builds that get past the sleep append
    /// their number to `.finished`.
    fn fake_gitbook(dir: &Path, prelude: &str, delay: &str) -> PathBuf {
        let path = dir.join("fake-gitbook");
        let script = format!(
            "#!/bin/sh\n\
             {prelude}\n\
             n=$(cat .builds 2>/dev/null || echo 0)\n\
             n=$((n + 1))\n\
             echo $n > .builds\n\
             sleep {delay}\n\
             echo $n >> .finished\n\
             mkdir -p \"$3\"\n\
             echo build-$n > \"$3/index.html\"\n\
             echo 'generation finished with success'\n"
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn manager(root: &Path, delay: &str) -> BuildManager {
        manager_with(root, "", delay)
    }

    fn manager_with(root: &Path, prelude: &str, delay: &str) -> BuildManager {
        let program = fake_gitbook(root, prelude, delay);
        let executor = BuildExecutor::new(OutputLayout::new(root), program, RuntimeEnv::Native);
        let config = ManagerConfig {
            port: 0,
            timings: WatchTimings {
                debounce: Duration::from_millis(50),
                cancel_grace: Duration::from_millis(50),
                kill_timeout: Duration::from_millis(200),
            },
            server: ServerConfig {
                reap_ports: false,
                ..Default::default()
            },
            open: false,
        };
        BuildManager::new(executor, WatchFilter::for_book(root).unwrap(), config)
    }

    async fn wait_for(path: &Path, expected: &str) -> bool {
        for _ in 0..100 {
            if fs::read_to_string(path).map(|s| s.trim() == expected).unwrap_or(false) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[test]
    fn timers_rearm_from_latest_call() {
        let mut timers = Timers::default();
        timers.arm(TimerKind::Debounce, Duration::from_secs(1));
        let first = timers.debounce.unwrap();

        timers.arm(TimerKind::Debounce, Duration::from_secs(5));

        assert!(timers.debounce.unwrap() > first);
        timers.disarm(TimerKind::Debounce);
        assert!(timers.debounce.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_fires_after_last_change() {
        let mut timers = Timers::default();
        let start = Instant::now();

        timers.arm(TimerKind::Debounce, Duration::from_millis(1000));
        tokio::time::advance(Duration::from_millis(600)).await;
        timers.arm(TimerKind::Debounce, Duration::from_millis(1000));

        elapsed(timers.debounce).await;

        assert!(Instant::now() - start >= Duration::from_millis(1600));
    }

    #[tokio::test]
    async fn initial_build_then_rebuild_on_change() {
        let temp = tempdir().unwrap();
        let root = temp.path().to_path_buf();
        fs::write(root.join("README.md"), "# Hello").unwrap();

        let manager = manager(&root, "0");
        let index = root.join("_book/index.html");
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let session = tokio::spawn(async move {
            manager
                .run(&FixedAnswer(true), async {
                    let _ = stop_rx.await;
                })
                .await
        });

        assert!(wait_for(&index, "build-1").await, "initial build not published");

        // Let the watcher settle before editing.
        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(root.join("README.md"), "# Changed").unwrap();

        assert!(wait_for(&index, "build-2").await, "rebuild not published");

        stop_tx.send(()).unwrap();
        session.await.unwrap().unwrap();
        assert!(!root.join("_book_temp").exists());
    }

    #[tokio::test]
    async fn existing_output_is_served_without_rebuild() {
        let temp = tempdir().unwrap();
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join("_book")).unwrap();
        fs::write(root.join("_book/index.html"), "previous").unwrap();

        let manager = manager(&root, "0");
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let session = tokio::spawn(async move {
            manager
                .run(&FixedAnswer(false), async {
                    let _ = stop_rx.await;
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        stop_tx.send(()).unwrap();
        session.await.unwrap().unwrap();

        assert_eq!(
            fs::read_to_string(root.join("_book/index.html")).unwrap(),
            "previous"
        );
        assert!(!root.join(".builds").exists());
    }

    #[tokio::test]
    async fn failing_initial_build_ends_session() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let program = root.join("broken-gitbook");
        fs::write(&program, "#!/bin/sh\necho 'Error: no book' >&2\nexit 1\n").unwrap();
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();

        let executor = BuildExecutor::new(OutputLayout::new(root), program, RuntimeEnv::Native);
        let config = ManagerConfig {
            port: 0,
            server: ServerConfig {
                reap_ports: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let manager = BuildManager::new(executor, WatchFilter::for_book(root).unwrap(), config);

        let result = manager
            .run(&FixedAnswer(true), std::future::pending::<()>())
            .await;

        assert!(matches!(result, Err(ManagerError::InitialBuildFailed)));
        assert!(!root.join("_book").exists());
    }

    #[tokio::test]
    async fn edits_during_slow_build_cancel_it() {
        let temp = tempdir().unwrap();
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join("_book")).unwrap();
        fs::write(root.join("_book/index.html"), "previous").unwrap();

        // Slow builds: the first rebuild is still running when the second edit lands.
        let manager = manager(&root, "2");
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let session = tokio::spawn(async move {
            manager
                .run(&FixedAnswer(false), async {
                    let _ = stop_rx.await;
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(root.join("a.md"), "one").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        fs::write(root.join("b.md"), "two").unwrap();

        // Build 1 is cancelled, build 2 (covering both files) publishes.
        assert!(
            wait_for(&root.join("_book/index.html"), "build-2").await,
            "replacement build not published"
        );

        stop_tx.send(()).unwrap();
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn build_ignoring_terminate_is_killed_after_deadline() {
        let temp = tempdir().unwrap();
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join("_book")).unwrap();
        fs::write(root.join("_book/index.html"), "previous").unwrap();

        let manager = manager_with(&root, "trap '' TERM", "2");
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let session = tokio::spawn(async move {
            manager
                .run(&FixedAnswer(false), async {
                    let _ = stop_rx.await;
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(root.join("a.md"), "one").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        fs::write(root.join("b.md"), "two").unwrap();

        assert!(
            wait_for(&root.join("_book/index.html"), "build-2").await,
            "replacement build not published"
        );
        // Build 1 shrugged off SIGTERM and had to be killed before its sleep ended.
        assert_eq!(fs::read_to_string(root.join(".finished")).unwrap().trim(), "2");

        stop_tx.send(()).unwrap();
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_during_initial_build_stops_it() {
        let temp = tempdir().unwrap();
        let root = temp.path().to_path_buf();

        let manager = manager(&root, "2");
        let result = manager
            .run(
                &FixedAnswer(true),
                tokio::time::sleep(Duration::from_millis(300)),
            )
            .await;

        assert!(result.is_ok());
        assert!(!root.join("_book_temp").exists());

        // Outlive the fake build's sleep: a surviving process would finish now.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!root.join(".finished").exists());
        assert!(!root.join("_book").exists());
        assert!(!root.join("_book_temp").exists());
    }
}
