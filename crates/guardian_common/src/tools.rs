//! Local tools the guardian can run on the brain's behalf.
//!
//! Every failure is turned into a sentence at the executor boundary so a
//! bad tool call never interrupts the rest of a batch.

use serde_json::{Map, Value};
use std::process::Command;
use sysinfo::{Pid, Signal, System};
use tracing::{error, info, warn};

/// Default number of processes reported by describe_top_processes
pub const DEFAULT_TOP_LIMIT: usize = 5;

/// Tools with a built-in implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    DescribeTopProcesses,
    KillProcess,
    LockWorkstation,
    EnterQuietMode,
    ExitQuietMode,
}

impl Tool {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "describe_top_processes" => Some(Tool::DescribeTopProcesses),
            "kill_process" => Some(Tool::KillProcess),
            "lock_workstation" => Some(Tool::LockWorkstation),
            "enter_quiet_mode" => Some(Tool::EnterQuietMode),
            "exit_quiet_mode" => Some(Tool::ExitQuietMode),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::DescribeTopProcesses => "describe_top_processes",
            Tool::KillProcess => "kill_process",
            Tool::LockWorkstation => "lock_workstation",
            Tool::EnterQuietMode => "enter_quiet_mode",
            Tool::ExitQuietMode => "exit_quiet_mode",
        }
    }
}

/// Tool failures, rendered to text before leaving the executor
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("missing argument '{0}'")]
    MissingArgument(&'static str),

    #[error("argument '{name}' must be a positive integer, got {value}")]
    InvalidArgument { name: &'static str, value: Value },

    #[error("Process with PID {0} no longer exists.")]
    NoSuchProcess(u32),

    #[error("signal was not delivered")]
    Signal,

    #[error("{0}")]
    Command(String),
}

/// Runs a named tool and describes the outcome in plain language
pub trait ToolExecutor: Send + Sync {
    fn execute(&self, tool: &str, args: &Map<String, Value>) -> String;
}

/// Executor backed by the local operating system
#[derive(Debug, Default)]
pub struct SystemToolExecutor;

impl SystemToolExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl ToolExecutor for SystemToolExecutor {
    fn execute(&self, tool: &str, args: &Map<String, Value>) -> String {
        info!("Executing tool: {} with args {:?}", tool, args);
        let Some(kind) = Tool::from_name(tool) else {
            return format!("I don't know how to execute tool '{}'.", tool);
        };

        match kind {
            Tool::DescribeTopProcesses => {
                match optional_count(args, "limit") {
                    Ok(limit) => describe_top_processes(limit.unwrap_or(DEFAULT_TOP_LIMIT)),
                    Err(e) => format!("I couldn't describe processes: {}", e),
                }
            }
            Tool::KillProcess => match required_pid(args) {
                Ok(pid) => kill_process(pid),
                Err(e) => format!("I couldn't terminate a process: {}", e),
            },
            Tool::LockWorkstation => lock_workstation(),
            Tool::EnterQuietMode => "Entering quiet mode.".to_string(),
            Tool::ExitQuietMode => "Exiting quiet mode.".to_string(),
        }
    }
}

/// One process CPU reading
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    /// Executable path, empty when unreadable
    pub exe: String,
    pub cpu_percent: f32,
}

/// Take two readings MINIMUM_CPU_UPDATE_INTERVAL apart so cpu_usage is meaningful
pub fn sample_processes() -> Vec<ProcessSample> {
    let mut sys = System::new();
    sys.refresh_processes();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_processes();
    samples_from(&sys)
}

pub fn samples_from(sys: &System) -> Vec<ProcessSample> {
    sys.processes()
        .iter()
        .map(|(pid, process)| ProcessSample {
            pid: pid.as_u32(),
            name: process.name().to_string(),
            exe: process
                .exe()
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_default(),
            cpu_percent: process.cpu_usage(),
        })
        .collect()
}

pub fn describe_top_processes(limit: usize) -> String {
    let summary = format_top_processes(sample_processes(), limit);
    info!("{}", summary);
    summary
}

/// Highest CPU first, at most `limit` lines
pub fn format_top_processes(mut samples: Vec<ProcessSample>, limit: usize) -> String {
    samples.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
    let lines: Vec<String> = samples
        .iter()
        .take(limit)
        .map(|p| format!("PID {} {} – CPU {:.1}%", p.pid, p.name, p.cpu_percent))
        .collect();

    if lines.is_empty() {
        return "I couldn't read any process information.".to_string();
    }
    format!("Top processes by CPU usage:\n{}", lines.join("\n"))
}

pub fn kill_process(pid: u32) -> String {
    match terminate(pid) {
        Ok(name) => {
            warn!("Terminated process {} (PID {}).", name, pid);
            format!("I terminated process {} (PID {}).", name, pid)
        }
        Err(ToolError::NoSuchProcess(pid)) => {
            let msg = ToolError::NoSuchProcess(pid).to_string();
            info!("{}", msg);
            msg
        }
        Err(e) => {
            error!("Failed to kill process {}: {}", pid, e);
            format!("I couldn't terminate process {}: {}", pid, e)
        }
    }
}

fn terminate(pid: u32) -> Result<String, ToolError> {
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return Err(ToolError::NoSuchProcess(pid.as_u32()));
    }
    let process = sys
        .process(pid)
        .ok_or(ToolError::NoSuchProcess(pid.as_u32()))?;
    let name = process.name().to_string();

    // SIGTERM where supported, hard kill otherwise
    let delivered = process.kill_with(Signal::Term).unwrap_or_else(|| process.kill());
    if delivered {
        Ok(name)
    } else {
        Err(ToolError::Signal)
    }
}

pub fn lock_workstation() -> String {
    match run_lock_command() {
        Ok(()) => {
            warn!("Workstation locked by Malcolm Guardian.");
            "I've locked your workstation.".to_string()
        }
        Err(e) => {
            error!("Failed to lock workstation: {}", e);
            format!("I couldn't lock the workstation: {}", e)
        }
    }
}

#[cfg(target_os = "windows")]
const LOCK_COMMAND: &[&str] = &["rundll32.exe", "user32.dll,LockWorkStation"];

#[cfg(target_os = "macos")]
const LOCK_COMMAND: &[&str] = &["pmset", "displaysleepnow"];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LOCK_COMMAND: &[&str] = &["loginctl", "lock-session"];

fn run_lock_command() -> Result<(), ToolError> {
    let (program, args) = (LOCK_COMMAND[0], &LOCK_COMMAND[1..]);
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ToolError::Command(format!("{} failed to start: {}", program, e)))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ToolError::Command(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )))
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn optional_count(args: &Map<String, Value>, name: &'static str) -> Result<Option<usize>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_count(value)
            .map(|n| Some(n as usize))
            .ok_or_else(|| ToolError::InvalidArgument {
                name,
                value: value.clone(),
            }),
    }
}

fn required_pid(args: &Map<String, Value>) -> Result<u32, ToolError> {
    let value = args.get("pid").ok_or(ToolError::MissingArgument("pid"))?;
    as_count(value)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|pid| *pid > 0)
        .ok_or_else(|| ToolError::InvalidArgument {
            name: "pid",
            value: value.clone(),
        })
}
