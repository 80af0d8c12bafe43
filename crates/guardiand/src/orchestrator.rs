//! Command Orchestrator
//!
//! One call to [`Orchestrator::handle_command`] per recognised command:
//!
//! 1. dispatch to the brain service (or an offline reply)
//! 2. announce the reply
//! 3. walk the tool calls strictly in order: policy, optional blocking
//!    confirmation, preference record, execution, session update
//!
//! Nothing here returns an error to the caller. Communication failures
//! fall back to the offline heuristic, and tool failures come back from
//! the executor as sentences.

use crate::confirmation::Confirmer;
use crate::speech::Speaker;
use guardian_common::brain_client::BrainMode;
use guardian_common::reply::BRAIN_NAME;
use guardian_common::{
    fallback, normalize, NormalizedResponse, PolicyEngine, PreferenceRecord, PreferenceSink,
    SessionState, ToolCallRequest, ToolExecutor,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, info_span};
use uuid::Uuid;

/// Side-effecting collaborators, injected already configured
pub struct Collaborators {
    pub executor: Arc<dyn ToolExecutor>,
    pub confirmer: Arc<dyn Confirmer>,
    pub preferences: Arc<dyn PreferenceSink>,
    pub speaker: Arc<dyn Speaker>,
}

/// What happened to the tool calls of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub executed: Vec<String>,
    pub denied: Vec<String>,
}

impl CommandOutcome {
    pub fn has_denials(&self) -> bool {
        !self.denied.is_empty()
    }
}

pub struct Orchestrator {
    brain: BrainMode,
    policy: PolicyEngine,
    session: Arc<SessionState>,
    executor: Arc<dyn ToolExecutor>,
    confirmer: Arc<dyn Confirmer>,
    preferences: Arc<dyn PreferenceSink>,
    speaker: Arc<dyn Speaker>,
}

impl Orchestrator {
    pub fn new(
        brain: BrainMode,
        policy: PolicyEngine,
        session: Arc<SessionState>,
        collaborators: Collaborators,
    ) -> Self {
        info!("Orchestrator ready (brain {}).", brain.describe());
        Self {
            brain,
            policy,
            session,
            executor: collaborators.executor,
            confirmer: collaborators.confirmer,
            preferences: collaborators.preferences,
            speaker: collaborators.speaker,
        }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Process one command end to end. Callers must not overlap calls.
    pub fn handle_command(&self, text: &str) -> CommandOutcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("command", %request_id);
        let _enter = span.enter();

        info!("Handling voice command: {}", text);
        let response = self.dispatch(text);
        self.speaker.speak(&response.reply_text);

        let mut outcome = CommandOutcome::default();
        for call in &response.tool_calls {
            self.run_tool_call(call, &mut outcome);
        }

        info!(
            executed = outcome.executed.len(),
            denied = outcome.denied.len(),
            "Command complete"
        );
        outcome
    }

    /// Get a normalized response from the brain service or a local stand-in
    pub fn dispatch(&self, text: &str) -> NormalizedResponse {
        match &self.brain {
            BrainMode::Disabled => fallback::disabled_response(text),
            BrainMode::Unconfigured => {
                error!("{} brain is enabled but base_url is empty.", BRAIN_NAME);
                fallback::unconfigured_response()
            }
            BrainMode::Live(backend) => {
                let context = json!({
                    "source": "voice",
                    "quiet_mode": self.session.is_quiet(),
                });
                match backend.call(text, &context) {
                    Ok(raw) => {
                        let response = normalize(&raw);
                        info!("Malcolm reply: {}", response.reply_text);
                        info!("Malcolm tool_calls: {:?}", response.tool_calls);
                        response.attributed()
                    }
                    Err(e) => {
                        error!("Error communicating with Malcolm Omni API: {}", e);
                        fallback::offline_response(text)
                    }
                }
            }
        }
    }

    fn run_tool_call(&self, call: &ToolCallRequest, outcome: &mut CommandOutcome) {
        let decision = self.policy.evaluate(call);

        if decision.requires_confirmation {
            let summary = format!("{} wants to execute '{}'. Allow?", BRAIN_NAME, decision.tool);
            info!("{}", summary);
            if !self.session.is_quiet() {
                self.speaker
                    .speak(&format!("{} Please answer in the console with Y or N.", summary));
            }

            let allow = self.confirmer.confirm(&decision);
            self.preferences
                .record(&PreferenceRecord::new(&decision.tool, allow));

            if !allow {
                info!("User denied tool {}.", decision.tool);
                outcome.denied.push(decision.tool);
                return;
            }
        }

        let result = self.executor.execute(&decision.tool, &decision.args);
        info!(tool = %decision.tool, args = ?decision.args, "Tool result: {}", result);

        self.session.apply_tool(&decision.tool);
        outcome.executed.push(decision.tool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirmation::ScriptedConfirmer;
    use crate::speech::RecordingSpeaker;
    use guardian_common::{BrainError, FakeBrainBackend, MemoryPreferenceSink, SystemToolExecutor};

    fn orchestrator(brain: BrainMode, speaker: Arc<RecordingSpeaker>) -> Orchestrator {
        Orchestrator::new(
            brain,
            PolicyEngine::new(["enter_quiet_mode", "exit_quiet_mode"], ["kill_process"]),
            Arc::new(SessionState::new(false)),
            Collaborators {
                executor: Arc::new(SystemToolExecutor::new()),
                confirmer: Arc::new(ScriptedConfirmer::default()),
                preferences: Arc::new(MemoryPreferenceSink::default()),
                speaker,
            },
        )
    }

    #[test]
    fn test_disabled_brain_echoes_without_tools() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let orch = orchestrator(BrainMode::Disabled, Arc::clone(&speaker));

        let outcome = orch.handle_command("enter quiet mode");

        assert_eq!(outcome, CommandOutcome::default());
        assert_eq!(
            speaker.spoken(),
            vec!["You said: 'enter quiet mode'. Malcolm API is currently disabled in config."]
        );
        assert!(!orch.session().is_quiet());
    }

    #[test]
    fn test_unconfigured_brain_speaks_config_error() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let orch = orchestrator(BrainMode::Unconfigured, Arc::clone(&speaker));

        let outcome = orch.handle_command("check cpu");

        assert!(outcome.executed.is_empty());
        assert!(speaker.spoken()[0].contains("base_url is not configured"));
    }

    #[test]
    fn test_live_reply_is_attributed() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let fake = FakeBrainBackend::always_valid(json!({"message": " All clear. "}));
        let orch = orchestrator(BrainMode::Live(Box::new(fake)), Arc::clone(&speaker));

        orch.handle_command("status report");
        assert_eq!(speaker.spoken(), vec!["Malcolm says: All clear."]);
    }

    #[test]
    fn test_communication_failure_uses_offline_heuristic() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let fake = FakeBrainBackend::always_error(BrainError::Timeout(15));
        let orch = orchestrator(BrainMode::Live(Box::new(fake)), Arc::clone(&speaker));

        let outcome = orch.handle_command("please enter quiet mode now");

        assert_eq!(outcome.executed, vec!["enter_quiet_mode"]);
        assert!(orch.session().is_quiet());
        let spoken = speaker.spoken();
        assert!(spoken[0].starts_with("Malcolm says: I could not reach my live core"));
        assert!(!spoken[0].starts_with("Malcolm says: Malcolm says:"));
    }
}
