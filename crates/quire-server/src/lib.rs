//! Watch, rebuild and serve loop for gitbook documentation sites.
//!
//! [`BuildMachine`] decides when to build, cancel and publish; [`BuildManager`]
//! drives it with a file watcher, timers, the build process and a static
//! server over the published output.

pub mod machine;
pub mod manager;
pub mod server;
pub mod watcher;

pub use machine::{Action, BuildMachine, BuildState, Event, TimerKind, WatchTimings};
pub use manager::{shutdown_signal, BuildManager, ManagerConfig, ManagerError};
pub use server::{router, ServerConfig, ServerError, StaticServer, DEFAULT_PORT};
pub use watcher::{FileWatcher, WatchError, WatchFilter, IGNORE_PATTERNS, INCLUDE_PATTERNS};
