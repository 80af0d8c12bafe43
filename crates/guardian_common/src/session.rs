//! Session state shared between the command listener and the watchdog.

use crate::tools::Tool;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Cross-command flags. Share behind `Arc`.
#[derive(Debug, Default)]
pub struct SessionState {
    quiet_mode: AtomicBool,
}

impl SessionState {
    pub fn new(quiet_mode: bool) -> Self {
        Self {
            quiet_mode: AtomicBool::new(quiet_mode),
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet_mode.load(Ordering::SeqCst)
    }

    pub fn set_quiet(&self, quiet: bool) {
        let previous = self.quiet_mode.swap(quiet, Ordering::SeqCst);
        if previous != quiet {
            info!("Quiet mode {}", if quiet { "enabled" } else { "disabled" });
        }
    }

    /// Apply the side effect of an executed tool, by name only.
    /// Returns the new quiet flag if the tool touched it.
    pub fn apply_tool(&self, tool: &str) -> Option<bool> {
        let quiet = match Tool::from_name(tool)? {
            Tool::EnterQuietMode => true,
            Tool::ExitQuietMode => false,
            _ => return None,
        };
        self.set_quiet(quiet);
        Some(quiet)
    }
}
