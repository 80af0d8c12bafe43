//! Guardian assembly and lifecycle
//!
//! Builds every collaborator from config, then runs the two long-lived
//! activities: the command listener and the security watchdog. They share
//! only the session state and the speech queue.

use crate::confirmation::ConsoleConfirmer;
use crate::listener::{CommandListener, UtteranceSource};
use crate::notifier::Notifier;
use crate::orchestrator::{Collaborators, Orchestrator};
use crate::speech::{ConsoleVoice, SilentSpeaker, Speaker, SpeechQueue};
use crate::watchdog::{SecurityWatchdog, WatchdogSettings};
use anyhow::{Context, Result};
use guardian_common::{
    BrainMode, GuardianConfig, PolicyEngine, PreferenceLog, SessionState, SystemToolExecutor,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::info;

pub const GREETING: &str = "Malcolm Guardian is now active.";

pub struct Guardian {
    config: GuardianConfig,
    session: Arc<SessionState>,
    speech: Option<Arc<SpeechQueue>>,
    speaker: Arc<dyn Speaker>,
    orchestrator: Arc<Orchestrator>,
    notifier: Arc<Notifier>,
    watchdog: Option<SecurityWatchdog>,
    listener_stop: Option<Arc<AtomicBool>>,
}

impl Guardian {
    pub fn build(config: GuardianConfig) -> Result<Self> {
        let session = Arc::new(SessionState::new(config.audio.quiet_mode));

        let speech = config.tts.enabled.then(|| {
            Arc::new(SpeechQueue::start(ConsoleVoice::new(config.tts.voice_name.clone())))
        });
        let speaker: Arc<dyn Speaker> = match &speech {
            Some(queue) => Arc::clone(queue) as Arc<dyn Speaker>,
            None => Arc::new(SilentSpeaker),
        };

        let brain = BrainMode::from_config(&config.brain).context("building brain client")?;
        let orchestrator = Orchestrator::new(
            brain,
            PolicyEngine::from_config(&config.policy),
            Arc::clone(&session),
            Collaborators {
                executor: Arc::new(SystemToolExecutor::new()),
                confirmer: Arc::new(ConsoleConfirmer),
                preferences: Arc::new(PreferenceLog::new(
                    config.learning.enabled,
                    config.preferences_path(),
                )),
                speaker: Arc::clone(&speaker),
            },
        );
        let notifier = Notifier::new(Arc::clone(&session), Arc::clone(&speaker));

        info!("MalcolmGuardian initialised (quiet_mode={}).", session.is_quiet());

        Ok(Self {
            config,
            session,
            speech,
            speaker,
            orchestrator: Arc::new(orchestrator),
            notifier: Arc::new(notifier),
            watchdog: None,
            listener_stop: None,
        })
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Start the listener and the watchdog on their own threads
    pub fn start(&mut self, mut source: Box<dyn UtteranceSource>) -> Result<()> {
        info!("Starting MalcolmGuardian subsystems.");

        let listener = CommandListener::new(self.config.audio.wake_word.clone());
        self.listener_stop = Some(listener.stop_handle());
        let orchestrator = Arc::clone(&self.orchestrator);
        // Not joined on stop: a pending read or confirmation can't be interrupted
        thread::Builder::new()
            .name("listener".to_string())
            .spawn(move || {
                listener.run(source.as_mut(), |command| {
                    orchestrator.handle_command(command);
                });
            })
            .context("spawning listener thread")?;

        if self.config.security.enabled {
            let notifier = Arc::clone(&self.notifier);
            let watchdog = SecurityWatchdog::start(
                WatchdogSettings::from_config(&self.config.security),
                move |event| {
                    notifier.handle_security_event(&event);
                },
            )
            .context("spawning watchdog thread")?;
            self.watchdog = Some(watchdog);
        }

        if !self.session.is_quiet() {
            self.speaker.speak(GREETING);
        }
        Ok(())
    }

    /// Stop accepting new work and flush pending speech
    pub fn stop(&mut self) {
        info!("Stopping MalcolmGuardian.");
        if let Some(stop) = self.listener_stop.take() {
            stop.store(true, Ordering::SeqCst);
        }
        if let Some(mut watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
        if let Some(speech) = &self.speech {
            speech.shutdown();
        }
    }
}
