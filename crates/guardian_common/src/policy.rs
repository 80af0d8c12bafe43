//! Tool Policy
//!
//! Decides per tool request whether it may run straight away or must be
//! confirmed by a human first. Anything not explicitly auto-allowed needs
//! confirmation, including tools the policy has never heard of.

use crate::config::PolicyConfig;
use crate::reply::ToolCallRequest;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::info;

/// Which rule matched a tool name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVerdict {
    AutoAllow,
    Confirm,
    /// Not listed anywhere; treated like Confirm
    Unknown,
}

impl PolicyVerdict {
    pub fn requires_confirmation(&self) -> bool {
        !matches!(self, PolicyVerdict::AutoAllow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyVerdict::AutoAllow => "auto_allow",
            PolicyVerdict::Confirm => "confirm",
            PolicyVerdict::Unknown => "unknown",
        }
    }
}

/// Policy verdict for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDecision {
    pub tool: String,
    pub args: Map<String, Value>,
    pub requires_confirmation: bool,
}

/// Static allow/confirm rules, fixed for the process lifetime
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    auto_allow: HashSet<String>,
    confirm_tools: HashSet<String>,
}

impl PolicyEngine {
    pub fn new<A, C>(auto_allow: A, confirm_tools: C) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let engine = Self {
            auto_allow: auto_allow.into_iter().map(Into::into).collect(),
            confirm_tools: confirm_tools.into_iter().map(Into::into).collect(),
        };
        info!(
            "PolicyEngine initialised. Auto={:?} Confirm={:?}",
            engine.auto_allow, engine.confirm_tools
        );
        engine
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(
            config.auto_allow_tools.iter().cloned(),
            config.confirm_tools.iter().cloned(),
        )
    }

    /// auto_allow takes precedence when a name is in both sets
    pub fn classify(&self, tool: &str) -> PolicyVerdict {
        if self.auto_allow.contains(tool) {
            PolicyVerdict::AutoAllow
        } else if self.confirm_tools.contains(tool) {
            PolicyVerdict::Confirm
        } else {
            PolicyVerdict::Unknown
        }
    }

    pub fn evaluate(&self, call: &ToolCallRequest) -> ToolDecision {
        info!("Evaluating tool call: {} {:?}", call.tool, call.args);
        let verdict = self.classify(&call.tool);
        if verdict == PolicyVerdict::Unknown {
            info!("Tool {} is unknown; requiring confirmation.", call.tool);
        }
        ToolDecision {
            tool: call.tool.clone(),
            args: call.args.clone(),
            requires_confirmation: verdict.requires_confirmation(),
        }
    }
}
