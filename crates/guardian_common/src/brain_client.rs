//! Brain Client - Malcolm Omni API
//!
//! `POST {base_url}/omni/command` with `{"command", "context"}`. Whatever
//! comes back is handed on as raw JSON; shaping it is the normalizer's job.
//! Non-2xx statuses become a diagnostic `message` rather than an error, so
//! only transport failures (timeouts, refused connections) surface as
//! [`BrainError`].

use crate::config::BrainConfig;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Path appended to the configured base URL
pub const COMMAND_PATH: &str = "/omni/command";

/// How much of an error body is quoted back
const ERROR_SNIPPET_CHARS: usize = 200;

/// Communication failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrainError {
    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("failed to create HTTP client: {0}")]
    ClientBuild(String),
}

/// Anything that can answer a command with a raw reply
pub trait BrainBackend: Send + Sync {
    fn call(&self, text: &str, context: &Value) -> Result<Value, BrainError>;
}

/// How commands get answered, decided once from config
pub enum BrainMode {
    /// Integration switched off
    Disabled,
    /// Enabled but no base_url
    Unconfigured,
    Live(Box<dyn BrainBackend>),
}

impl BrainMode {
    pub fn from_config(config: &BrainConfig) -> Result<Self, BrainError> {
        if !config.enabled {
            return Ok(BrainMode::Disabled);
        }
        if config.is_unconfigured() {
            return Ok(BrainMode::Unconfigured);
        }
        Ok(BrainMode::Live(Box::new(HttpBrainClient::new(config)?)))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            BrainMode::Disabled => "disabled",
            BrainMode::Unconfigured => "unconfigured",
            BrainMode::Live(_) => "live",
        }
    }
}

/// Real backend over HTTP
pub struct HttpBrainClient {
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl HttpBrainClient {
    pub fn new(config: &BrainConfig) -> Result<Self, BrainError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrainError::ClientBuild(e.to_string()))?;

        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        info!("HttpBrainClient initialised. Base URL={}", base_url);

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, COMMAND_PATH)
    }

    fn map_send_error(&self, e: reqwest::Error) -> BrainError {
        if e.is_timeout() {
            BrainError::Timeout(self.timeout_secs)
        } else {
            BrainError::Http(format!("Request failed: {}", e))
        }
    }
}

impl BrainBackend for HttpBrainClient {
    fn call(&self, text: &str, context: &Value) -> Result<Value, BrainError> {
        let url = self.url();
        let payload = json!({
            "command": text,
            "context": context,
        });
        debug!("POST {} payload={}", url, payload);

        let mut request = self.client.post(&url).json(&payload);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        info!("Malcolm API POST status: {}", status.as_u16());

        let body = response.text().map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Ok(error_reply(status.as_u16(), &body));
        }
        Ok(parse_success_body(body))
    }
}

/// Diagnostic reply for a non-2xx status
pub fn error_reply(status: u16, body: &str) -> Value {
    json!({
        "message": format!(
            "Malcolm API error {} when calling {}. Response was: {}.",
            status,
            COMMAND_PATH,
            body_snippet(body)
        ),
        "actions": [],
    })
}

fn body_snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no body".to_string();
    }
    if trimmed.chars().count() > ERROR_SNIPPET_CHARS {
        let head: String = trimmed.chars().take(ERROR_SNIPPET_CHARS).collect();
        format!("{}…", head)
    } else {
        trimmed.to_string()
    }
}

/// JSON objects pass through; anything else is wrapped as a message
pub fn parse_success_body(body: String) -> Value {
    match serde_json::from_str::<Value>(&body) {
        Ok(value @ Value::Object(_)) => {
            debug!("Raw Malcolm JSON: {}", value);
            value
        }
        _ => {
            let preview: String = body.chars().take(500).collect();
            warn!("Malcolm responded with non-JSON body: {}", preview);
            json!({ "message": body })
        }
    }
}

/// Scripted backend for tests
pub struct FakeBrainBackend {
    responses: Mutex<Vec<Result<Value, BrainError>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl FakeBrainBackend {
    /// Replies are consumed in order; the last one repeats
    pub fn new(responses: Vec<Result<Value, BrainError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_valid(reply: Value) -> Self {
        Self::new(vec![Ok(reply)])
    }

    pub fn always_error(error: BrainError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Every (text, context) seen so far
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

impl BrainBackend for FakeBrainBackend {
    fn call(&self, text: &str, context: &Value) -> Result<Value, BrainError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), context.clone()));

        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => Err(BrainError::Http("no scripted response".to_string())),
            1 => responses[0].clone(),
            _ => responses.remove(0),
        }
    }
}
