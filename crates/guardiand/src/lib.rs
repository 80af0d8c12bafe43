//! Guardian daemon library - exposes modules for testing.

pub mod admin;
pub mod confirmation;
pub mod guardian;
pub mod listener;
pub mod logging;
pub mod notifier;
pub mod orchestrator;
pub mod speech;
pub mod watchdog;
