//! Security notifications: spoken unless the session is in quiet mode.

use crate::speech::Speaker;
use guardian_common::{SecurityEvent, SessionState, Severity};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Notifier {
    session: Arc<SessionState>,
    speaker: Arc<dyn Speaker>,
}

impl Notifier {
    pub fn new(session: Arc<SessionState>, speaker: Arc<dyn Speaker>) -> Self {
        Self { session, speaker }
    }

    /// Returns whether the event was spoken
    pub fn handle_security_event(&self, event: &SecurityEvent) -> bool {
        match event.severity {
            Severity::Warning => warn!("Security event: {}", event.description),
            Severity::Info => info!("Security event: {}", event.description),
        }
        if self.session.is_quiet() {
            return false;
        }
        self.speaker
            .speak(&format!("Security note: {}", event.description));
        true
    }
}
