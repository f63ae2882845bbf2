//! Handles for background build processes.
//!
//! The build runs in its own process group so one signal reaches the gitbook
//! binary and everything it spawns. The handle keeps the negated group id as the
//! signal target; output is collected by a reader task and delivered together
//! with the exit status.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;

use crate::shell::{self, ProcessError};

/// How a build process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildExit {
    /// Exit code, `None` when killed by a signal or never waited on
    pub code: Option<i32>,
    /// Terminating signal number
    pub signal: Option<i32>,
    /// stdout followed by stderr
    pub output: String,
}

impl BuildExit {
    pub fn was_signalled(&self) -> bool {
        self.signal.is_some()
    }
}

/// Signals the manager sends to a running build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Ask the build to stop (SIGTERM)
    Terminate,
    /// Stop it unconditionally (SIGKILL)
    Kill,
}

/// Where signals for a build are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalTarget {
    /// Negated process-group id: reaches the whole tree
    Group(i32),
    /// Only the direct child; subprocesses may survive
    Single(i32),
    /// The child already exited before its pid could be read
    Gone,
}

/// A running build process.
///
/// Dropping the handle before its exit was observed kills the process group.
#[derive(Debug)]
pub struct BuildProcess {
    target: SignalTarget,
    exit: oneshot::Receiver<BuildExit>,
    exited: bool,
}

impl BuildProcess {
    /// Start `cmd` under bash in `cwd`, in a new process group.
    pub fn spawn(cmd: &str, cwd: &Path) -> Result<Self, ProcessError> {
        let mut command = shell::shell_command(cmd);
        command
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            cmd: cmd.to_string(),
            source,
        })?;

        let target = match child.id() {
            Some(pid) if cfg!(unix) => SignalTarget::Group(-(pid as i32)),
            Some(pid) => SignalTarget::Single(pid as i32),
            None => SignalTarget::Gone,
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (out, err) = tokio::join!(read_all(stdout), read_all(stderr));
            let status = child.wait().await;

            let mut output = out;
            output.push_str(&err);

            let exit = match status {
                Ok(status) => BuildExit {
                    code: status.code(),
                    signal: exit_signal(&status),
                    output,
                },
                Err(e) => {
                    tracing::warn!("Failed to wait for build process: {}", e);
                    BuildExit {
                        code: None,
                        signal: None,
                        output,
                    }
                }
            };

            // The receiver is gone when the manager shut down; nothing to report.
            let _ = tx.send(exit);
        });

        Ok(Self {
            target,
            exit: rx,
            exited: false,
        })
    }

    /// Send a stop signal. Delivery failures (already exited) are ignored.
    pub fn signal(&self, signal: StopSignal) {
        let pid = match self.target {
            SignalTarget::Group(pid) | SignalTarget::Single(pid) => pid,
            SignalTarget::Gone => return,
        };
        send_signal(pid, signal);
    }

    /// Wait for the process to exit.
    ///
    /// The exit is delivered once; later calls return an empty `BuildExit`.
    pub async fn wait(&mut self) -> BuildExit {
        if self.exited {
            return BuildExit::default();
        }
        let exit = (&mut self.exit).await.unwrap_or_default();
        self.exited = true;
        exit
    }

    /// Whether the exit has been observed through [`BuildProcess::wait`].
    pub fn has_exited(&self) -> bool {
        self.exited
    }

    /// Negated group id when the process runs in its own group.
    pub fn group_id(&self) -> Option<i32> {
        match self.target {
            SignalTarget::Group(id) => Some(id),
            _ => None,
        }
    }
}

impl Drop for BuildProcess {
    fn drop(&mut self) {
        // The child lives in the reader task, so kill_on_drop never fires here.
        if !self.exited {
            self.signal(StopSignal::Kill);
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            tracing::debug!("Build output stream closed early: {}", e);
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(unix)]
fn send_signal(pid: i32, signal: StopSignal) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let sig = match signal {
        StopSignal::Terminate => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    };
    // A negative pid addresses the whole process group.
    if let Err(e) = kill(Pid::from_raw(pid), sig) {
        tracing::debug!("Signal {:?} to {} not delivered: {}", sig, pid, e);
    }
}

#[cfg(not(unix))]
fn send_signal(pid: i32, signal: StopSignal) {
    tracing::warn!("Cannot send {:?} to {} on this platform", signal, pid);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn collects_output_and_exit_code() {
        let temp = tempfile::tempdir().unwrap();
        let mut proc = BuildProcess::spawn("echo hello; echo oops >&2; exit 4", temp.path()).unwrap();

        let exit = proc.wait().await;

        assert_eq!(exit.code, Some(4));
        assert!(!exit.was_signalled());
        assert!(exit.output.contains("hello"));
        assert!(exit.output.contains("oops"));
    }

    #[tokio::test]
    async fn runs_in_own_process_group() {
        let temp = tempfile::tempdir().unwrap();
        let mut proc = BuildProcess::spawn("exit 0", temp.path()).unwrap();

        #[cfg(unix)]
        assert!(matches!(proc.group_id(), Some(id) if id < 0));
        proc.wait().await;
    }

    #[tokio::test]
    async fn terminate_stops_whole_group() {
        let temp = tempfile::tempdir().unwrap();
        // The inner sleep is a grandchild; only a group signal closes its pipe.
        let mut proc = BuildProcess::spawn("sleep 30 & sleep 30; wait", temp.path()).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        proc.signal(StopSignal::Terminate);

        let exit = tokio::time::timeout(Duration::from_secs(5), proc.wait())
            .await
            .expect("build process should exit after SIGTERM");

        assert!(exit.was_signalled());
        assert_eq!(exit.code, None);
    }

    #[tokio::test]
    async fn kill_stops_a_build_that_ignores_terminate() {
        let temp = tempfile::tempdir().unwrap();
        let mut proc = BuildProcess::spawn("trap '' TERM; sleep 30", temp.path()).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        proc.signal(StopSignal::Terminate);

        let still_running = tokio::time::timeout(Duration::from_millis(300), proc.wait()).await;
        assert!(still_running.is_err(), "SIGTERM should be ignored");
        assert!(!proc.has_exited());

        proc.signal(StopSignal::Kill);
        let exit = tokio::time::timeout(Duration::from_secs(5), proc.wait())
            .await
            .expect("build process should exit after SIGKILL");

        assert!(exit.was_signalled());
        assert!(proc.has_exited());
    }

    #[tokio::test]
    async fn dropping_an_unfinished_build_kills_it() {
        let temp = tempfile::tempdir().unwrap();
        let proc = BuildProcess::spawn("sleep 1; touch finished", temp.path()).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(proc);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!temp.path().join("finished").exists());
    }

    #[tokio::test]
    async fn wait_after_exit_returns_empty() {
        let temp = tempfile::tempdir().unwrap();
        let mut proc = BuildProcess::spawn("echo once", temp.path()).unwrap();

        assert!(proc.wait().await.output.contains("once"));
        assert_eq!(proc.wait().await, BuildExit::default());
    }

    #[tokio::test]
    async fn signalling_finished_process_is_harmless() {
        let temp = tempfile::tempdir().unwrap();
        let mut proc = BuildProcess::spawn("true", temp.path()).unwrap();
        proc.wait().await;

        proc.signal(StopSignal::Kill);
    }
}
