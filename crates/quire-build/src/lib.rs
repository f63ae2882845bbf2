//! Build plumbing for gitbook documentation sites.
//!
//! Pins the legacy Node.js runtime gitbook needs, runs the gitbook binary as a
//! background process group, and swaps finished output into place atomically.

pub mod executor;
pub mod fsops;
pub mod port;
pub mod process;
pub mod runtime;
pub mod shell;
pub mod status;
pub mod toolchain;

pub use executor::{has_output, BuildError, BuildExecutor, BuildOutcome, OutputLayout};
pub use fsops::FsError;
pub use port::{reap_port, reap_server_ports, LIVERELOAD_PORT};
pub use process::{BuildExit, BuildProcess, StopSignal};
pub use runtime::{Confirm, EnvironmentError, FixedAnswer, RuntimeEnv, RuntimeResolver};
pub use shell::ProcessError;
pub use status::{format_files, Progress};
pub use toolchain::Toolchain;
