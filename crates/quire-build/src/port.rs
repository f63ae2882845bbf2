//! Reaping processes left bound to the server ports by earlier runs.

use tracing::{debug, warn};

use crate::shell::{self, OutputMode};

/// Port the generator's live-reload server binds; reaped alongside the server port.
pub const LIVERELOAD_PORT: u16 = 35729;

/// Parse `lsof -t` output into pids, skipping blanks and garbage.
pub fn parse_pids(output: &str) -> Vec<i32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<i32>().ok())
        .filter(|pid| *pid > 0)
        .collect()
}

/// Kill every process listening on `port` except the current one.
///
/// Returns the pids that were signalled. Missing `lsof` or an unused port both
/// yield an empty list.
pub async fn reap_port(port: u16) -> Vec<i32> {
    let cmd = format!("lsof -ti:{}", port);
    let output = match shell::run(&cmd, None, OutputMode::Capture).await {
        Ok(out) if out.success() => out.output,
        Ok(_) => return Vec::new(),
        Err(e) => {
            debug!("Port lookup unavailable: {}", e);
            return Vec::new();
        }
    };

    let own = std::process::id() as i32;
    let pids: Vec<i32> = parse_pids(&output)
        .into_iter()
        .filter(|pid| *pid != own)
        .collect();

    if pids.is_empty() {
        return pids;
    }

    warn!(
        "Killing server on port {} (PIDs: {})",
        port,
        pids.iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    for pid in &pids {
        force_kill(*pid);
    }

    pids
}

/// Reap the server port and the live-reload port.
pub async fn reap_server_ports(port: u16, livereload_port: u16) -> Vec<i32> {
    let mut killed = reap_port(livereload_port).await;
    if port != livereload_port {
        killed.extend(reap_port(port).await);
    }
    killed
}

#[cfg(unix)]
fn force_kill(pid: i32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!("kill {} failed: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn force_kill(pid: i32) {
    debug!("Cannot signal pid {} on this platform", pid);
}
