//! Deterministic Orchestration Tests
//!
//! These tests use FakeBrainBackend, ScriptedConfirmer and a recording
//! executor to verify command flows without network, console or OS calls.

use guardian_common::brain_client::BrainMode;
use guardian_common::{
    BrainError, FakeBrainBackend, MemoryPreferenceSink, PolicyEngine, SecurityEvent,
    SecurityEventType, SessionState, Severity, ToolExecutor,
};
use guardiand::confirmation::ScriptedConfirmer;
use guardiand::notifier::Notifier;
use guardiand::orchestrator::{Collaborators, Orchestrator};
use guardiand::speech::RecordingSpeaker;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

// ============================================================================
// Harness
// ============================================================================

#[derive(Default)]
struct RecordingExecutor {
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl RecordingExecutor {
    fn tools(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

impl ToolExecutor for RecordingExecutor {
    fn execute(&self, tool: &str, args: &Map<String, Value>) -> String {
        self.calls.lock().unwrap().push((tool.to_string(), args.clone()));
        match tool {
            "kill_process" => "I couldn't terminate process 1: permission denied".to_string(),
            other => format!("ran {}", other),
        }
    }
}

struct Harness {
    orchestrator: Orchestrator,
    session: Arc<SessionState>,
    executor: Arc<RecordingExecutor>,
    confirmer: Arc<ScriptedConfirmer>,
    preferences: Arc<MemoryPreferenceSink>,
    speaker: Arc<RecordingSpeaker>,
}

fn harness(brain: BrainMode, answers: Vec<bool>, quiet: bool) -> Harness {
    let session = Arc::new(SessionState::new(quiet));
    let executor = Arc::new(RecordingExecutor::default());
    let confirmer = Arc::new(ScriptedConfirmer::new(answers));
    let preferences = Arc::new(MemoryPreferenceSink::default());
    let speaker = Arc::new(RecordingSpeaker::default());

    let orchestrator = Orchestrator::new(
        brain,
        PolicyEngine::new(
            ["describe_top_processes", "enter_quiet_mode", "exit_quiet_mode"],
            ["kill_process", "lock_workstation"],
        ),
        Arc::clone(&session),
        Collaborators {
            executor: executor.clone(),
            confirmer: confirmer.clone(),
            preferences: preferences.clone(),
            speaker: speaker.clone(),
        },
    );

    Harness {
        orchestrator,
        session,
        executor,
        confirmer,
        preferences,
        speaker,
    }
}

fn live(reply: Value) -> BrainMode {
    BrainMode::Live(Box::new(FakeBrainBackend::always_valid(reply)))
}

// ============================================================================
// Ordering
// ============================================================================

/// Direct tool_calls run before actions, each group in its own order
#[test]
fn test_tool_calls_execute_in_discovery_order() {
    let h = harness(
        live(json!({
            "reply_text": "On it.",
            "tool_calls": [
                {"tool": "describe_top_processes", "args": {"limit": 3}},
                {"tool": "enter_quiet_mode"},
            ],
            "actions": [
                {"type": "exit_quiet_mode", "details": {}},
                {"type": "describe_top_processes", "details": {"limit": 1}},
            ],
        })),
        vec![],
        false,
    );

    let outcome = h.orchestrator.handle_command("do things");

    assert_eq!(
        h.executor.tools(),
        vec!["describe_top_processes", "enter_quiet_mode", "exit_quiet_mode", "describe_top_processes"]
    );
    assert_eq!(outcome.executed.len(), 4);
    assert!(!outcome.has_denials());

    let calls = h.executor.calls.lock().unwrap();
    assert_eq!(calls[0].1.get("limit"), Some(&json!(3)));
    assert_eq!(calls[3].1.get("limit"), Some(&json!(1)));
}

/// A mode toggle earlier in the batch is visible to later calls
#[test]
fn test_quiet_toggle_affects_later_prompts_in_same_batch() {
    let h = harness(
        live(json!({
            "message": "Going quiet.",
            "tool_calls": [
                {"tool": "enter_quiet_mode"},
                {"tool": "kill_process", "args": {"pid": 1}},
            ],
        })),
        vec![true],
        false,
    );

    h.orchestrator.handle_command("go quiet and kill it");

    assert!(h.session.is_quiet());
    // Reply only; the confirmation prompt was not spoken in quiet mode
    assert_eq!(h.speaker.spoken(), vec!["Malcolm says: Going quiet."]);
    assert_eq!(h.confirmer.asked(), vec!["kill_process"]);
}

// ============================================================================
// Confirmation gate
// ============================================================================

/// Denied tools are recorded and never executed
#[test]
fn test_denied_confirmation_skips_tool() {
    let h = harness(
        live(json!({"actions": [{"type": "kill_process", "details": {"pid": 4242}}]})),
        vec![false],
        false,
    );

    let outcome = h.orchestrator.handle_command("kill it");

    assert!(h.executor.tools().is_empty());
    assert_eq!(outcome.denied, vec!["kill_process"]);
    assert!(outcome.has_denials());

    let records = h.preferences.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tool, "kill_process");
    assert!(!records[0].confirmed);
}

/// Approved tools are recorded and executed exactly once
#[test]
fn test_approved_confirmation_executes_once() {
    let h = harness(
        live(json!({"tool_calls": [{"tool": "lock_workstation"}]})),
        vec![true],
        false,
    );

    let outcome = h.orchestrator.handle_command("lock my computer");

    assert_eq!(h.executor.tools(), vec!["lock_workstation"]);
    assert_eq!(outcome.executed, vec!["lock_workstation"]);

    let records = h.preferences.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].confirmed);

    let spoken = h.speaker.spoken();
    assert_eq!(
        spoken.last().unwrap(),
        "Malcolm wants to execute 'lock_workstation'. Allow? Please answer in the console with Y or N."
    );
}

/// Auto-allowed tools never prompt and leave no preference record
#[test]
fn test_auto_allowed_tool_skips_gate() {
    let h = harness(
        live(json!({"tool_calls": [{"tool": "describe_top_processes", "args": {"limit": 5}}]})),
        vec![],
        false,
    );

    h.orchestrator.handle_command("top processes");

    assert!(h.confirmer.asked().is_empty());
    assert!(h.preferences.records().is_empty());
    assert_eq!(h.executor.tools(), vec!["describe_top_processes"]);
}

/// Unknown tools go through the gate and still reach the executor if approved
#[test]
fn test_unknown_tool_requires_confirmation() {
    let h = harness(
        live(json!({"actions": [{"type": "shield:activate", "details": {}}]})),
        vec![true],
        false,
    );

    h.orchestrator.handle_command("activate shield");

    assert_eq!(h.confirmer.asked(), vec!["shield:activate"]);
    assert_eq!(h.executor.tools(), vec!["shield:activate"]);
}

/// A failing tool does not stop the rest of the batch
#[test]
fn test_execution_failure_does_not_abort_batch() {
    let h = harness(
        live(json!({
            "tool_calls": [
                {"tool": "kill_process", "args": {"pid": 1}},
                {"tool": "exit_quiet_mode"},
            ],
        })),
        vec![true],
        true,
    );

    let outcome = h.orchestrator.handle_command("kill init then talk");

    assert_eq!(outcome.executed, vec!["kill_process", "exit_quiet_mode"]);
    assert!(!h.session.is_quiet());
}

/// Mixed approvals are recorded in order
#[test]
fn test_mixed_answers() {
    let h = harness(
        live(json!({
            "tool_calls": [
                {"tool": "kill_process", "args": {"pid": 10}},
                {"tool": "kill_process", "args": {"pid": 11}},
            ],
        })),
        vec![false, true],
        false,
    );

    let outcome = h.orchestrator.handle_command("kill both");

    assert_eq!(outcome.denied, vec!["kill_process"]);
    assert_eq!(outcome.executed, vec!["kill_process"]);
    let confirmed: Vec<bool> = h.preferences.records().iter().map(|r| r.confirmed).collect();
    assert_eq!(confirmed, vec![false, true]);
    assert_eq!(h.executor.calls.lock().unwrap()[0].1.get("pid"), Some(&json!(11)));
}

// ============================================================================
// Dispatch
// ============================================================================

/// Communication failure falls back with the original text
#[test]
fn test_communication_failure_falls_back() {
    let fake = Arc::new(FakeBrainBackend::always_error(BrainError::Http(
        "connection refused".to_string(),
    )));

    struct Shared(Arc<FakeBrainBackend>);
    impl guardian_common::BrainBackend for Shared {
        fn call(&self, text: &str, context: &Value) -> Result<Value, BrainError> {
            self.0.call(text, context)
        }
    }

    let h = harness(BrainMode::Live(Box::new(Shared(Arc::clone(&fake)))), vec![], false);
    let outcome = h.orchestrator.handle_command("check cpu performance");

    let calls = fake.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "check cpu performance");
    assert_eq!(calls[0].1, json!({"source": "voice", "quiet_mode": false}));

    assert_eq!(outcome.executed, vec!["describe_top_processes"]);
    assert_eq!(
        h.speaker.spoken()[0],
        "Malcolm says: I could not reach my live core just now, but I heard you say: 'check cpu performance'. I will respond locally. Let me check your top processes now."
    );
}

/// Disabled brain: no heuristic tools, even for matching phrases
#[test]
fn test_disabled_brain_has_no_heuristic_tools() {
    let h = harness(BrainMode::Disabled, vec![], false);
    let outcome = h.orchestrator.handle_command("enter quiet mode");

    assert!(outcome.executed.is_empty());
    assert!(!h.session.is_quiet());
}

/// Non-2xx replies are spoken as Malcolm text, not treated as failures
#[test]
fn test_error_reply_is_spoken() {
    let h = harness(
        live(json!({
            "message": "Malcolm API error 500 when calling /omni/command. Response was: boom.",
            "actions": [],
        })),
        vec![],
        false,
    );

    h.orchestrator.handle_command("hello");
    assert_eq!(
        h.speaker.spoken(),
        vec!["Malcolm says: Malcolm API error 500 when calling /omni/command. Response was: boom."]
    );
}

/// Acknowledgement replies
#[test]
fn test_acknowledgement_reply() {
    let h = harness(
        live(json!({"received_command": "activate security", "status": "executed"})),
        vec![],
        false,
    );

    h.orchestrator.handle_command("activate security");
    assert_eq!(
        h.speaker.spoken(),
        vec!["Malcolm says: The command 'activate security' has status: executed."]
    );
}

// ============================================================================
// Session state and notifications
// ============================================================================

/// enter_quiet_mode silences notifications; exit_quiet_mode restores them
#[test]
fn test_quiet_mode_gates_security_notifications() {
    let brain = BrainMode::Live(Box::new(FakeBrainBackend::new(vec![
        Ok(json!({"tool_calls": [{"tool": "enter_quiet_mode"}]})),
        Ok(json!({"tool_calls": [{"tool": "exit_quiet_mode"}]})),
    ])));
    let h = harness(brain, vec![], false);

    let notifier_speaker = Arc::new(RecordingSpeaker::default());
    let notifier = Notifier::new(Arc::clone(&h.session), notifier_speaker.clone());
    let event = SecurityEvent::new(
        SecurityEventType::SuspiciousProcessName,
        Severity::Warning,
        "Suspicious process 'xmrig' (PID 99).",
    );

    h.orchestrator.handle_command("quiet please");
    assert!(!notifier.handle_security_event(&event));
    assert!(notifier_speaker.spoken().is_empty());

    h.orchestrator.handle_command("talk to me");
    assert!(notifier.handle_security_event(&event));
    assert_eq!(
        notifier_speaker.spoken(),
        vec!["Security note: Suspicious process 'xmrig' (PID 99)."]
    );
}

/// Session update depends on the tool name only, not its result
#[test]
fn test_session_update_ignores_result_text() {
    struct FailingExecutor;
    impl ToolExecutor for FailingExecutor {
        fn execute(&self, _tool: &str, _args: &Map<String, Value>) -> String {
            "something went wrong".to_string()
        }
    }

    let session = Arc::new(SessionState::new(false));
    let orchestrator = Orchestrator::new(
        live(json!({"tool_calls": [{"tool": "enter_quiet_mode"}]})),
        PolicyEngine::new(["enter_quiet_mode"], Vec::<String>::new()),
        Arc::clone(&session),
        Collaborators {
            executor: Arc::new(FailingExecutor),
            confirmer: Arc::new(ScriptedConfirmer::default()),
            preferences: Arc::new(MemoryPreferenceSink::default()),
            speaker: Arc::new(RecordingSpeaker::default()),
        },
    );

    orchestrator.handle_command("quiet");
    assert!(session.is_quiet());
}

/// Quiet state travels to the brain in the request context
#[test]
fn test_context_reports_quiet_mode() {
    let fake = Arc::new(FakeBrainBackend::always_valid(json!({"message": "ok"})));

    struct Shared(Arc<FakeBrainBackend>);
    impl guardian_common::BrainBackend for Shared {
        fn call(&self, text: &str, context: &Value) -> Result<Value, BrainError> {
            self.0.call(text, context)
        }
    }

    let h = harness(BrainMode::Live(Box::new(Shared(Arc::clone(&fake)))), vec![], true);
    h.orchestrator.handle_command("status");

    assert_eq!(fake.calls()[0].1["quiet_mode"], true);
}
