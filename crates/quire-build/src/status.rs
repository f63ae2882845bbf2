//! Status lines for long-running steps.
//!
//! A [`Progress`] is created when a step starts and consumed by exactly one of
//! [`Progress::succeed`], [`Progress::fail`] or [`Progress::cancel`]. Dropping it
//! unresolved still prints a failure marker, so a status never stays "in
//! progress".

use std::time::Instant;

/// How many changed files a status line names before summarizing.
pub const MAX_FILES_TO_SHOW: usize = 3;

/// A status line for one running step.
#[derive(Debug)]
pub struct Progress {
    message: String,
    started: Instant,
    resolved: bool,
}

impl Progress {
    /// Announce a step.
    pub fn start(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::info!("… {}", message);
        Self {
            message,
            started: Instant::now(),
            resolved: false,
        }
    }

    /// Message the step was started with.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn succeed(mut self, message: &str) {
        self.resolved = true;
        tracing::info!("✓ {} ({}ms)", message, self.started.elapsed().as_millis());
    }

    pub fn fail(mut self, message: &str) {
        self.resolved = true;
        tracing::error!("✗ {}", message);
    }

    /// Resolve a step that was abandoned on purpose.
    pub fn cancel(mut self, message: &str) {
        self.resolved = true;
        tracing::info!("↻ {}", message);
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::warn!("✗ {} (interrupted)", self.message);
        }
    }
}

/// Summarize a list of changed files for a status line.
///
/// `["a.md", "b.md", "c.md", "d.md"]` becomes `a.md, b.md, c.md +1 more`.
pub fn format_files<S: AsRef<str>>(files: &[S]) -> String {
    let shown: Vec<&str> = files
        .iter()
        .take(MAX_FILES_TO_SHOW)
        .map(|f| f.as_ref())
        .collect();
    let listed = shown.join(", ");

    if files.len() > MAX_FILES_TO_SHOW {
        format!("{} +{} more", listed, files.len() - MAX_FILES_TO_SHOW)
    } else {
        listed
    }
}
