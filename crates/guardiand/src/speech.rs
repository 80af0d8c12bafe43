//! Speech output
//!
//! `speak` only enqueues; a single worker thread renders utterances one at
//! a time, in order. Audio synthesis itself lives behind [`Voice`].

use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Fire-and-forget speech output
pub trait Speaker: Send + Sync {
    fn speak(&self, text: &str);
}

/// Renders one utterance; called only from the speech worker
pub trait Voice: Send {
    fn render(&mut self, text: &str);
}

/// Prints utterances to stdout
#[derive(Debug, Default)]
pub struct ConsoleVoice {
    label: Option<String>,
}

impl ConsoleVoice {
    pub fn new(label: Option<String>) -> Self {
        Self { label }
    }
}

impl Voice for ConsoleVoice {
    fn render(&mut self, text: &str) {
        match &self.label {
            Some(label) => println!("🔊 [{}] {}", label, text),
            None => println!("🔊 {}", text),
        }
    }
}

/// Queued speaker backed by one worker thread
pub struct SpeechQueue {
    sender: Mutex<Option<Sender<String>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SpeechQueue {
    pub fn start<V: Voice + 'static>(mut voice: V) -> Self {
        let (sender, receiver) = mpsc::channel::<String>();
        let worker = thread::Builder::new()
            .name("speech".to_string())
            .spawn(move || {
                for text in receiver {
                    voice.render(&text);
                }
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Could not start speech worker: {}", e);
                None
            }
        };
        info!("SpeechQueue initialised (queued mode).");

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(worker),
        }
    }

    /// Stop accepting text, let queued utterances finish, join the worker
    pub fn shutdown(&self) {
        info!("SpeechQueue shutdown requested.");
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = worker {
            if handle.join().is_err() {
                warn!("Speech worker panicked during shutdown.");
            }
        }
        info!("SpeechQueue shut down.");
    }
}

impl Speaker for SpeechQueue {
    fn speak(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        info!("Speaking: {}", text);
        let Ok(sender) = self.sender.lock() else {
            return;
        };
        match sender.as_ref() {
            Some(tx) if tx.send(text.to_string()).is_ok() => {}
            _ => warn!("Speech queue is closed; dropping: {}", text),
        }
    }
}

impl Drop for SpeechQueue {
    fn drop(&mut self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }
}

/// Used when speech output is disabled in config
#[derive(Debug, Default)]
pub struct SilentSpeaker;

impl Speaker for SilentSpeaker {
    fn speak(&self, text: &str) {
        info!("(speech disabled) {}", text);
    }
}

/// Keeps everything it was asked to say
#[derive(Debug, Default)]
pub struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeaker {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Speaker for RecordingSpeaker {
    fn speak(&self, text: &str) {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
    }
}
