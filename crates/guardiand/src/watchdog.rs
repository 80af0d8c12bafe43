//! Security Watchdog - periodic process scan
//!
//! Rules per process:
//! - PID 0 and "System Idle Process" are skipped (bogus CPU readings)
//! - name or exe path contains a configured pattern → suspicious_process_name (warning)
//! - CPU at or above threshold → high_cpu_process (info)

use guardian_common::config::SecurityConfig;
use guardian_common::tools::{samples_from, ProcessSample};
use guardian_common::{SecurityEvent, SecurityEventType, Severity};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use sysinfo::System;
use tracing::{info, warn};

/// How often the sleep loop checks the stop flag
const STOP_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    pub interval: Duration,
    pub cpu_threshold: f32,
    /// Lowercased, non-empty
    pub suspicious_names: Vec<String>,
}

impl WatchdogSettings {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.effective_scan_interval()),
            cpu_threshold: config.suspicious_cpu_threshold,
            suspicious_names: config
                .suspicious_names
                .iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }
}

/// Events for one set of samples
pub fn scan(samples: &[ProcessSample], settings: &WatchdogSettings) -> Vec<SecurityEvent> {
    let mut events = Vec::new();

    for sample in samples {
        let name = sample.name.trim();
        let name_lower = name.to_lowercase();
        if sample.pid == 0 || name_lower == "system idle process" {
            continue;
        }
        let exe_lower = sample.exe.to_lowercase();

        if settings.suspicious_names.iter().any(|pattern| {
            name_lower.contains(pattern.as_str()) || exe_lower.contains(pattern.as_str())
        }) {
            events.push(
                SecurityEvent::new(
                    SecurityEventType::SuspiciousProcessName,
                    Severity::Warning,
                    format!("Suspicious process '{}' (PID {}).", name, sample.pid),
                )
                .with_data(json!({"pid": sample.pid, "name": name, "exe": exe_lower})),
            );
        }

        if sample.cpu_percent >= settings.cpu_threshold {
            events.push(
                SecurityEvent::new(
                    SecurityEventType::HighCpuProcess,
                    Severity::Info,
                    format!(
                        "Process '{}' (PID {}) is using high CPU: {:.1}%.",
                        name, sample.pid, sample.cpu_percent
                    ),
                )
                .with_data(json!({"pid": sample.pid, "name": name, "cpu": sample.cpu_percent})),
            );
        }
    }

    events
}

/// Background scanner thread
pub struct SecurityWatchdog {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SecurityWatchdog {
    pub fn start<F>(settings: WatchdogSettings, on_event: F) -> std::io::Result<Self>
    where
        F: Fn(SecurityEvent) + Send + 'static,
    {
        info!("SecurityWatchdog starting (every {:?}).", settings.interval);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || run(settings, thread_stop, on_event))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        info!("SecurityWatchdog stopping.");
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Watchdog thread panicked.");
            }
        }
    }
}

impl Drop for SecurityWatchdog {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn run<F: Fn(SecurityEvent)>(settings: WatchdogSettings, stop: Arc<AtomicBool>, on_event: F) {
    let mut sys = System::new();
    while !stop.load(Ordering::SeqCst) {
        sys.refresh_processes();
        for event in scan(&samples_from(&sys), &settings) {
            on_event(event);
        }

        let deadline = Instant::now() + settings.interval;
        while !stop.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(STOP_POLL.min(deadline.saturating_duration_since(Instant::now())));
        }
    }
}
