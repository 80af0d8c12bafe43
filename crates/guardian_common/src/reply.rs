//! Reply Normalizer
//!
//! Turns whatever JSON the brain service sends back into a
//! [`NormalizedResponse`]: one speakable string plus an ordered list of
//! tool requests. Every extraction rule here is total; an unrecognised shape degrades
//! to a pretty-printed dump of the reply instead of an error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name the brain service goes by in spoken text
pub const BRAIN_NAME: &str = "Malcolm";

/// Used whenever no reply text can be derived at all
pub const NO_REPLY_TEXT: &str = "Malcolm has no reply text for this command.";

/// One requested tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args: Map::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }
}

/// Canonical result of one command
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResponse {
    /// Never blank
    pub reply_text: String,
    /// In discovery order
    pub tool_calls: Vec<ToolCallRequest>,
    /// Set when `reply_text` is the [`NO_REPLY_TEXT`] stand-in
    placeholder: bool,
}

impl NormalizedResponse {
    /// Build a response, substituting [`NO_REPLY_TEXT`] for blank text
    pub fn new(reply_text: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        let reply_text = reply_text.into();
        let placeholder = reply_text.trim().is_empty();
        Self {
            reply_text: if placeholder {
                NO_REPLY_TEXT.to_string()
            } else {
                reply_text
            },
            tool_calls,
            placeholder,
        }
    }

    pub fn text_only(reply_text: impl Into<String>) -> Self {
        Self::new(reply_text, Vec::new())
    }

    /// True when no reply text could be derived
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Mark the text as coming from the live brain service
    pub fn attributed(mut self) -> Self {
        if !self.placeholder {
            self.reply_text = format!("{} says: {}", BRAIN_NAME, self.reply_text);
        }
        self
    }
}

/// Normalize one raw reply. Never fails.
pub fn normalize(raw: &Value) -> NormalizedResponse {
    let reply_text = extract_reply_text(raw).unwrap_or_default();
    NormalizedResponse::new(reply_text, extract_tool_calls(raw))
}

/// Derive a speakable string, first matching rule wins.
///
/// 1. `message` / `reply_text` / `reply`
/// 2. `data.{message, reply, text, response}`
/// 3. `{received_command, status}` acknowledgement
/// 4. `error` / `detail` / `message_error`
/// 5. bare `status`
/// 6. `response`
/// 7. JSON dump of the whole reply
pub fn extract_reply_text(raw: &Value) -> Option<String> {
    let empty = Map::new();
    let data = raw.as_object().unwrap_or(&empty);

    first_text(data, &["message", "reply_text", "reply"])
        .or_else(|| nested_text(data))
        .or_else(|| acknowledgement_text(data))
        .or_else(|| error_text(data))
        .or_else(|| status_text(data))
        .or_else(|| first_text(data, &["response"]))
        .or_else(|| dump_text(raw))
}

/// Collect tool requests: direct `tool_calls` first, then `actions`.
pub fn extract_tool_calls(raw: &Value) -> Vec<ToolCallRequest> {
    let Some(data) = raw.as_object() else {
        return Vec::new();
    };

    let direct = objects_in(data, "tool_calls").filter_map(|tc| {
        let tool = first_name(tc, &["tool"])?;
        Some(ToolCallRequest {
            tool,
            args: first_args(tc, &["args"]),
        })
    });

    let actions = objects_in(data, "actions").filter_map(|action| {
        let tool = first_name(action, &["tool", "type"])?;
        Some(ToolCallRequest {
            tool,
            args: first_args(action, &["args", "details", "params"]),
        })
    });

    direct.chain(actions).collect()
}

fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| non_blank(obj.get(*key)))
        .map(str::to_string)
}

fn nested_text(data: &Map<String, Value>) -> Option<String> {
    let nested = data.get("data")?.as_object()?;
    first_text(nested, &["message", "reply", "text", "response"])
}

fn acknowledgement_text(data: &Map<String, Value>) -> Option<String> {
    let received = data.get("received_command")?.as_str()?;
    let status = data.get("status")?.as_str()?;
    Some(format!("The command '{}' has status: {}.", received, status))
}

fn error_text(data: &Map<String, Value>) -> Option<String> {
    let error = first_text(data, &["error", "detail", "message_error"])?;
    Some(format!("There was an error from {}: {}", BRAIN_NAME, error))
}

fn status_text(data: &Map<String, Value>) -> Option<String> {
    if data.get("received_command").is_some_and(is_truthy) {
        return None;
    }
    let status = non_blank(data.get("status"))?;
    Some(format!(
        "Current status reported by {} is: {}.",
        BRAIN_NAME, status
    ))
}

fn dump_text(raw: &Value) -> Option<String> {
    serde_json::to_string_pretty(raw)
        .ok()
        .filter(|s| !s.trim().is_empty())
}

/// JSON truthiness: null, false, 0, "", [] and {} are falsy
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn objects_in<'a>(
    data: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> {
    data.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn first_name(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .map(str::to_string)
}

fn first_args(obj: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_object).filter(|o| !o.is_empty()))
        .cloned()
        .unwrap_or_default()
}
