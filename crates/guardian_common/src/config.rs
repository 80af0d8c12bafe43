//! Guardian Configuration
//!
//! Single TOML file, every section optional. Missing keys fall back to
//! the defaults below so a partial file is always valid.
//!
//! Default location: ./config/config.toml (override with --config)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default config location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Brain service (Malcolm Omni API) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainConfig {
    /// Whether live calls are made at all
    #[serde(default)]
    pub enabled: bool,

    /// Base URL, e.g. https://malcolm.example.net (no trailing /omni/command)
    #[serde(default)]
    pub base_url: String,

    /// Sent as a Bearer token when non-empty
    #[serde(default)]
    pub api_key: String,

    /// Request timeout (seconds)
    #[serde(default = "default_brain_timeout")]
    pub timeout_secs: u64,
}

fn default_brain_timeout() -> u64 {
    15
}

impl BrainConfig {
    /// Enabled but without a usable endpoint
    pub fn is_unconfigured(&self) -> bool {
        self.base_url.trim().is_empty()
    }
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: default_brain_timeout(),
        }
    }
}

/// Tool policy: which tools run without asking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_auto_allow")]
    pub auto_allow_tools: Vec<String>,

    #[serde(default = "default_confirm_tools")]
    pub confirm_tools: Vec<String>,
}

fn default_auto_allow() -> Vec<String> {
    vec![
        "describe_top_processes".to_string(),
        "enter_quiet_mode".to_string(),
        "exit_quiet_mode".to_string(),
    ]
}

fn default_confirm_tools() -> Vec<String> {
    vec!["kill_process".to_string(), "lock_workstation".to_string()]
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            auto_allow_tools: default_auto_allow(),
            confirm_tools: default_confirm_tools(),
        }
    }
}

/// Preference learning (confirmation answers log)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Wake word and startup session state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_wake_word")]
    pub wake_word: String,

    /// Initial quiet mode
    #[serde(default)]
    pub quiet_mode: bool,
}

fn default_wake_word() -> String {
    "malcolm".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            wake_word: default_wake_word(),
            quiet_mode: false,
        }
    }
}

/// Speech output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Optional voice label shown next to each utterance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_name: Option<String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            voice_name: None,
        }
    }
}

/// Process watchdog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scan interval (seconds, valid: 1-3600)
    #[serde(default = "default_scan_interval")]
    pub process_scan_interval_secs: u64,

    /// CPU percentage at or above which a process is reported
    #[serde(default = "default_cpu_threshold")]
    pub suspicious_cpu_threshold: f32,

    /// Case-insensitive substrings matched against process names
    #[serde(default)]
    pub suspicious_names: Vec<String>,
}

fn default_scan_interval() -> u64 {
    15
}

fn default_cpu_threshold() -> f32 {
    75.0
}

impl SecurityConfig {
    /// Clamp process_scan_interval_secs to valid range (1-3600)
    pub fn effective_scan_interval(&self) -> u64 {
        self.process_scan_interval_secs.clamp(1, 3600)
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            process_scan_interval_secs: default_scan_interval(),
            suspicious_cpu_threshold: default_cpu_threshold(),
            suspicious_names: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for guardian.log and preferences.jsonl
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Complete guardian configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GuardianConfig {
    #[serde(default)]
    pub brain: BrainConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub learning: LearningConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl GuardianConfig {
    /// Load config from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    /// Path of the append-only preference log
    pub fn preferences_path(&self) -> PathBuf {
        self.log.dir.join("preferences.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GuardianConfig::default();
        assert!(!config.brain.enabled);
        assert!(config.brain.is_unconfigured());
        assert_eq!(config.brain.timeout_secs, 15);
        assert_eq!(config.audio.wake_word, "malcolm");
        assert!(!config.audio.quiet_mode);
        assert!(config.learning.enabled);
        assert!(config.tts.enabled);
        assert_eq!(config.security.process_scan_interval_secs, 15);
        assert_eq!(config.log.level, "info");
        assert!(config.policy.confirm_tools.contains(&"kill_process".to_string()));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = GuardianConfig::parse(
            r#"
            [brain]
            enabled = true
            base_url = "http://127.0.0.1:8000"

            [audio]
            quiet_mode = true
            "#,
        )
        .unwrap();

        assert!(config.brain.enabled);
        assert!(!config.brain.is_unconfigured());
        assert!(config.brain.api_key.is_empty());
        assert_eq!(config.brain.timeout_secs, 15);
        assert!(config.audio.quiet_mode);
        assert_eq!(config.audio.wake_word, "malcolm");
        assert_eq!(config.policy.auto_allow_tools.len(), 3);
    }

    #[test]
    fn test_shipped_sample_parses() {
        let config =
            GuardianConfig::parse(include_str!("../../../config/config.toml")).unwrap();
        assert!(!config.brain.enabled);
        assert_eq!(config.security.suspicious_names.len(), 3);
        assert_eq!(config.tts.voice_name, None);
    }

    #[test]
    fn test_whitespace_base_url_is_unconfigured() {
        let brain = BrainConfig {
            enabled: true,
            base_url: "   ".to_string(),
            ..Default::default()
        };
        assert!(brain.is_unconfigured());
    }

    #[test]
    fn test_scan_interval_clamping() {
        let mut security = SecurityConfig {
            process_scan_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(security.effective_scan_interval(), 1);

        security.process_scan_interval_secs = 100_000;
        assert_eq!(security.effective_scan_interval(), 3600);

        security.process_scan_interval_secs = 30;
        assert_eq!(security.effective_scan_interval(), 30);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GuardianConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.audio.wake_word, "malcolm");
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[brain\nenabled = ").unwrap();

        let err = GuardianConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = GuardianConfig::default();
        config.security.suspicious_names = vec!["miner".to_string()];
        config.save(&path).unwrap();

        let reloaded = GuardianConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.security.suspicious_names, vec!["miner".to_string()]);
        assert!(fs::read_to_string(&path).unwrap().contains("[brain]"));
    }
}
