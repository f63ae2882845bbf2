//! The watch/rebuild state machine.
//!
//! [`BuildMachine`] decides *what* happens when files change, timers fire and
//! builds exit; it owns no processes, timers or I/O. Each call to
//! [`BuildMachine::handle`] returns the actions the driver must carry out, in
//! order.
//!
//! ```text
//!            change (arm debounce)
//!   Idle ──────────────────────────┐
//!    ▲  debounce elapsed, pending  │
//!    │ ─────────────────────────▶ Building ── change (arm grace) ──┐
//!    │                              │   ▲                          │
//!    │        build exited          │   └──────────────────────────┘
//!    ◀──────────────────────────────┤
//!    │                              │ grace elapsed: SIGTERM, arm kill deadline
//!    │        build exited          ▼
//!    ◀─────────────────────────── Cancelling ── kill deadline: SIGKILL
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use quire_build::BuildExit;

/// Quiet period after the last change before a build starts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Quiet period after a change during a build before that build is cancelled.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_millis(500);

/// Time a cancelled build gets to exit after SIGTERM before SIGKILL.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Durations driving the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchTimings {
    pub debounce: Duration,
    pub cancel_grace: Duration,
    pub kill_timeout: Duration,
}

impl Default for WatchTimings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            cancel_grace: DEFAULT_CANCEL_GRACE,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
        }
    }
}

/// Whether a build is running, and whether it is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildState {
    #[default]
    Idle,
    Building,
    Cancelling,
}

/// Timers owned by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Debounce,
    CancelGrace,
    KillDeadline,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A watched file changed (project-relative path)
    FileChanged(String),
    /// An armed timer fired
    TimerElapsed(TimerKind),
    /// The running build exited
    BuildExited(BuildExit),
    /// The build process could not be started
    SpawnFailed,
}

/// Work for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start or restart a timer
    Arm(TimerKind, Duration),
    /// Stop a timer if running
    Disarm(TimerKind),
    /// Launch a build for these changed files
    StartBuild(Vec<String>),
    /// SIGTERM the build's process group
    Terminate,
    /// SIGKILL the build's process group
    Kill,
    /// Classify the finished build, then swap or clean up and report
    Publish(BuildExit),
    /// Drop a cancelled build's output
    Discard,
}

/// State of one watch/rebuild session.
#[derive(Debug, Clone, Default)]
pub struct BuildMachine {
    state: BuildState,
    pending: BTreeSet<String>,
    current: Vec<String>,
    timings: WatchTimings,
}

impl BuildMachine {
    pub fn new(timings: WatchTimings) -> Self {
        Self {
            timings,
            ..Default::default()
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Changes not yet handed to a build.
    pub fn pending(&self) -> &BTreeSet<String> {
        &self.pending
    }

    /// Files that triggered the running build.
    pub fn current(&self) -> &[String] {
        &self.current
    }

    /// Feed one event and get the resulting actions.
    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        let mut actions = Vec::new();

        match event {
            Event::FileChanged(path) => {
                self.pending.insert(path);
                match self.state {
                    BuildState::Idle => {
                        actions.push(Action::Arm(TimerKind::Debounce, self.timings.debounce));
                    }
                    BuildState::Building => {
                        let grace = self.timings.cancel_grace;
                        actions.push(Action::Arm(TimerKind::CancelGrace, grace));
                    }
                    // A kill is already in flight.
                    BuildState::Cancelling => {}
                }
            }

            Event::TimerElapsed(TimerKind::Debounce) => {
                if self.state == BuildState::Idle && !self.pending.is_empty() {
                    self.start_build(&mut actions);
                }
            }

            Event::TimerElapsed(TimerKind::CancelGrace) => {
                if self.state == BuildState::Building {
                    self.state = BuildState::Cancelling;
                    actions.push(Action::Terminate);
                    actions.push(Action::Arm(TimerKind::KillDeadline, self.timings.kill_timeout));
                }
            }

            Event::TimerElapsed(TimerKind::KillDeadline) => {
                if self.state == BuildState::Cancelling {
                    actions.push(Action::Kill);
                }
            }

            Event::BuildExited(exit) => {
                if self.state == BuildState::Idle {
                    return actions;
                }

                let cancelled = self.state == BuildState::Cancelling || exit.was_signalled();
                actions.push(Action::Disarm(TimerKind::CancelGrace));
                actions.push(Action::Disarm(TimerKind::KillDeadline));

                if cancelled {
                    self.requeue_current();
                    actions.push(Action::Discard);
                } else {
                    self.current.clear();
                    actions.push(Action::Publish(exit));
                }

                self.state = BuildState::Idle;
                // Changes that arrived mid-build (or were cancelled) go straight out.
                if !self.pending.is_empty() {
                    self.start_build(&mut actions);
                }
            }

            Event::SpawnFailed => {
                if self.state != BuildState::Idle {
                    self.requeue_current();
                    self.state = BuildState::Idle;
                    actions.push(Action::Disarm(TimerKind::CancelGrace));
                    actions.push(Action::Disarm(TimerKind::KillDeadline));
                }
            }
        }

        actions
    }

    fn start_build(&mut self, actions: &mut Vec<Action>) {
        self.current = std::mem::take(&mut self.pending).into_iter().collect();
        self.state = BuildState::Building;
        actions.push(Action::Disarm(TimerKind::Debounce));
        actions.push(Action::StartBuild(self.current.clone()));
    }

    fn requeue_current(&mut self) {
        self.pending.extend(self.current.drain(..));
    }
}
