//! File watching for rebuilds.

use std::path::{Path, PathBuf};

use glob::Pattern;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Book sources that trigger a rebuild, relative to the project root.
pub const INCLUDE_PATTERNS: &[&str] = &["*.md", "**/*.md", "book.json", "SUMMARY.md"];

/// Paths never watched: build output, dependencies and tool state.
pub const IGNORE_PATTERNS: &[&str] = &[
    "_book",
    "_book/**",
    "_book_temp",
    "_book_temp/**",
    "_book_stale",
    "_book_stale/**",
    "node_modules/**",
    "gitbook-plugins/**",
    ".gitbook/**",
];

/// Errors from setting up a watch.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Invalid watch pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Decides which paths under the project root count as source changes.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    include: Vec<Pattern>,
    ignore: Vec<Pattern>,
}

impl WatchFilter {
    pub fn new(root: &Path, include: &[&str], ignore: &[&str]) -> Result<Self, WatchError> {
        // notify reports resolved paths, so match against the resolved root.
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Ok(Self {
            root,
            include: compile(include)?,
            ignore: compile(ignore)?,
        })
    }

    /// Filter for a gitbook project.
    pub fn for_book(root: &Path) -> Result<Self, WatchError> {
        Self::new(root, INCLUDE_PATTERNS, IGNORE_PATTERNS)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Project-relative path of a watched file, or `None` if it is filtered out.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let rel = rel.to_string_lossy().replace('\\', "/");
        if rel.is_empty() {
            return None;
        }

        if self.ignore.iter().any(|p| p.matches(&rel)) {
            return None;
        }
        if self.include.iter().any(|p| p.matches(&rel)) {
            Some(rel)
        } else {
            None
        }
    }
}

fn compile(patterns: &[&str]) -> Result<Vec<Pattern>, WatchError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| WatchError::Pattern {
                pattern: p.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Whether a notify event is a change to file contents or existence.
fn is_change(kind: &EventKind) -> bool {
    use notify::event::ModifyKind;

    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// Recursive watch over the project root.
///
/// Changed paths arrive on the returned channel as project-relative strings.
/// Dropping the watcher ends the subscription.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    pub fn new(filter: WatchFilter) -> Result<(Self, mpsc::UnboundedReceiver<String>), WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let root = filter.root().to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("Watch error: {}", e);
                    return;
                }
            };
            if !is_change(&event.kind) {
                return;
            }
            for path in &event.paths {
                if let Some(rel) = filter.relative(path) {
                    // Receiver gone means the manager stopped watching.
                    let _ = tx.send(rel);
                }
            }
        })
        .map_err(|source| WatchError::Watch {
            path: root.clone(),
            source,
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Watch {
                path: root.clone(),
                source,
            })?;

        Ok((Self { _watcher: watcher }, rx))
    }
}
