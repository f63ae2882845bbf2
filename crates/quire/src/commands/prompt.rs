//! Terminal yes/no prompts.

use std::io::{self, BufRead, Write};

use quire_build::Confirm;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Asks on the terminal. Enter alone means yes.
#[derive(Debug, Clone, Copy)]
pub struct TerminalPrompt {
    assume_yes: bool,
}

impl TerminalPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Confirm for TerminalPrompt {
    fn confirm(&self, question: &str) -> bool {
        if self.assume_yes {
            tracing::debug!("{} (Y/n) yes", question);
            return true;
        }

        let mut stderr = io::stderr();
        let _ = write!(stderr, "? {} (Y/n) ", question);
        let _ = stderr.flush();

        match read_answer(|| io::stdin().lock()) {
            Ok(answer) => parse_answer(&answer),
            Err(e) => {
                tracing::debug!("Could not read answer: {}", e);
                true
            }
        }
    }
}

/// Read one line without stalling the runtime's worker thread.
fn read_answer<R, F>(open: F) -> io::Result<String>
where
    R: BufRead,
    F: FnOnce() -> R,
{
    let read = || -> io::Result<String> {
        let mut answer = String::new();
        open().read_line(&mut answer)?;
        Ok(answer)
    };

    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(read)
        }
        _ => read(),
    }
}

/// Empty, `y` and `yes` (any case) are yes; everything else is no.
fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
}
