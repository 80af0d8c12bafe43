//! Guardian Common - shared types for the Malcolm guardian
//!
//! Reply normalization, tool policy, offline fallback, session state and
//! the collaborators they talk to (brain service, tools, preference log).

pub mod brain_client;
pub mod config;
pub mod events;
pub mod fallback;
pub mod policy;
pub mod preferences;
pub mod reply;
pub mod session;
pub mod tools;

pub use brain_client::{BrainBackend, BrainError, BrainMode, FakeBrainBackend, HttpBrainClient};
pub use config::{ConfigError, GuardianConfig};
pub use events::{SecurityEvent, SecurityEventType, Severity};
pub use policy::{PolicyEngine, PolicyVerdict, ToolDecision};
pub use preferences::{
    MemoryPreferenceSink, PreferenceLog, PreferenceRecord, PreferenceSink, ToolPreference,
};
pub use reply::{normalize, NormalizedResponse, ToolCallRequest};
pub use session::SessionState;
pub use tools::{SystemToolExecutor, Tool, ToolExecutor};
