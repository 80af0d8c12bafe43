//! Confirmation gate - blocking human approval for tool calls
//!
//! Only `y`/`yes`/`n`/`no` end the prompt; anything else asks again.

use guardian_common::ToolDecision;
use owo_colors::OwoColorize;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;
use tracing::warn;

/// Synchronous yes/no from a human. Blocks the calling thread.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, decision: &ToolDecision) -> bool;
}

/// Parse one answer line
pub fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Prompt until an unambiguous answer arrives. EOF is an error, not a denial.
///
/// `console` is only borrowed per write, so other writers sharing it (the
/// speech worker) are never locked out while the reader blocks.
pub fn prompt_until_answer<R, W>(reader: &mut R, console: &W, decision: &ToolDecision) -> io::Result<bool>
where
    R: BufRead,
    W: ?Sized,
    for<'a> &'a W: Write,
{
    let mut out = console;
    let args = serde_json::Value::Object(decision.args.clone());
    loop {
        write!(
            out,
            "Allow Malcolm to execute '{}' with args {}? {} ",
            decision.tool.bold(),
            args,
            "[y/n]:".yellow()
        )?;
        out.flush()?;

        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "confirmation input closed",
            ));
        }

        if let Some(answer) = parse_answer(&line) {
            return Ok(answer);
        }
        writeln!(out, "Please answer y or n.")?;
    }
}

/// Asks on the controlling terminal
#[derive(Debug, Default)]
pub struct ConsoleConfirmer;

impl Confirmer for ConsoleConfirmer {
    fn confirm(&self, decision: &ToolDecision) -> bool {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut reader = stdin.lock();

        match prompt_until_answer(&mut reader, &stdout, decision) {
            Ok(answer) => {
                let mut out = &stdout;
                let _ = writeln!(
                    out,
                    "{}",
                    if answer {
                        "✓ Confirmed.".green().to_string()
                    } else {
                        "✗ Cancelled.".red().to_string()
                    }
                );
                answer
            }
            Err(e) => {
                // No human to ask; nothing runs without an answer
                warn!("Confirmation for '{}' unavailable ({}); treating as denied.", decision.tool, e);
                false
            }
        }
    }
}

/// Pre-scripted answers; denies once the script runs out
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Tool names confirmation was requested for, in order
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, decision: &ToolDecision) -> bool {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(decision.tool.clone());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop_front())
            .unwrap_or(false)
    }
}
