//! Offline responses used when the live brain service can't answer.
//!
//! `offline_response` is a tiny keyword matcher, not an intent engine.
//! The disabled and unconfigured replies never produce tool calls.

use crate::reply::{NormalizedResponse, ToolCallRequest};

/// Reply when the live core could not be reached
pub fn offline_response(text: &str) -> NormalizedResponse {
    let mut reply = format!(
        "Malcolm says: I could not reach my live core just now, but I heard you say: '{}'. I will respond locally.",
        text
    );
    let mut tool_calls = Vec::new();

    if let Some((call, clause)) = match_intent(&text.to_lowercase()) {
        tool_calls.push(call);
        reply.push_str(clause);
    }

    NormalizedResponse::new(reply, tool_calls)
}

/// Reply when the integration is switched off in config
pub fn disabled_response(text: &str) -> NormalizedResponse {
    NormalizedResponse::text_only(format!(
        "You said: '{}'. Malcolm API is currently disabled in config.",
        text
    ))
}

/// Reply when the integration is enabled without an endpoint
pub fn unconfigured_response() -> NormalizedResponse {
    NormalizedResponse::text_only(
        "Malcolm API base_url is not configured. Please check config.toml.",
    )
}

// First match wins
fn match_intent(lowered: &str) -> Option<(ToolCallRequest, &'static str)> {
    if lowered.contains("quiet mode") && !lowered.contains("exit") {
        return Some((
            ToolCallRequest::new("enter_quiet_mode"),
            " I will enter quiet mode.",
        ));
    }
    if lowered.contains("exit quiet") || lowered.contains("leave quiet") {
        return Some((
            ToolCallRequest::new("exit_quiet_mode"),
            " I will exit quiet mode.",
        ));
    }
    if ["top process", "cpu", "performance"]
        .iter()
        .any(|kw| lowered.contains(kw))
    {
        return Some((
            ToolCallRequest::new("describe_top_processes").with_arg("limit", 5),
            " Let me check your top processes now.",
        ));
    }
    None
}
