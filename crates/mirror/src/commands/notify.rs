//! Out-of-band operator notifications

use log::info;
use std::sync::Mutex;

/// Delivers messages to the operator outside of a command reply
pub trait Notifier: Send + Sync {
    fn notify(&self, text: &str);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, text: &str) {
        info!("[NOTIFY] {}", text);
    }
}

/// Keeps notifications in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}
