//! Wake-word command listener
//!
//! Consumes recognised utterances one at a time (speech-to-text happens
//! upstream) and forwards the ones addressed to the guardian. The next
//! utterance is not read until the previous command has been handled.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Source of recognised utterances. `None` means the source is closed.
pub trait UtteranceSource: Send {
    fn next_utterance(&mut self) -> Option<String>;
}

/// One utterance per stdin line. Locks stdin only while reading a line so
/// the confirmation prompt can share it.
#[derive(Debug, Default)]
pub struct StdinSource;

impl UtteranceSource for StdinSource {
    fn next_utterance(&mut self) -> Option<String> {
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                warn!("Error while listening: {}", e);
                None
            }
        }
    }
}

impl UtteranceSource for VecDeque<String> {
    fn next_utterance(&mut self) -> Option<String> {
        self.pop_front()
    }
}

/// Strip the first occurrence of the wake word.
///
/// Returns `None` when the wake word isn't present. If nothing is left
/// after stripping, the full utterance is used as the command.
pub fn extract_command(heard: &str, wake_word: &str) -> Option<String> {
    let lowered = heard.to_lowercase();
    let wake = wake_word.to_lowercase();
    if !lowered.contains(&wake) {
        return None;
    }
    let command = lowered.replacen(&wake, "", 1).trim().to_string();
    if command.is_empty() {
        Some(heard.trim().to_string())
    } else {
        Some(command)
    }
}

pub struct CommandListener {
    wake_word: String,
    stop: Arc<AtomicBool>,
}

impl CommandListener {
    pub fn new(wake_word: impl Into<String>) -> Self {
        Self {
            wake_word: wake_word.into(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the loop before the next utterance is read
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run until the source closes or stop is requested
    pub fn run<S, F>(&self, source: &mut S, mut on_command: F)
    where
        S: UtteranceSource + ?Sized,
        F: FnMut(&str),
    {
        info!("Listening for wake word '{}'.", self.wake_word);
        while !self.stop.load(Ordering::SeqCst) {
            let Some(heard) = source.next_utterance() else {
                info!("Command source closed.");
                break;
            };
            if heard.trim().is_empty() {
                continue;
            }

            match extract_command(&heard, &self.wake_word) {
                Some(command) => {
                    info!("Wake word detected. Command: {}", command);
                    on_command(&command);
                }
                None => info!("Heard speech but no wake word: {}", heard),
            }
        }
    }
}
