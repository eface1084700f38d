//! Command dispatch against the mirror engine

use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::command::Command;
use super::notify::Notifier;
use super::texts::{Texts, bullet_list, fill};
use crate::models::{ChannelRef, ChatInfo};
use crate::sync::{Mirror, SyncError, format_interval};

/// Executes operator commands and formats their replies
pub struct CommandShell {
    mirror: Arc<Mirror>,
    texts: Arc<Texts>,
    notifier: Arc<dyn Notifier>,
    /// Loop workers not yet joined, including superseded ones still finishing a cycle
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CommandShell {
    pub fn new(mirror: Arc<Mirror>, texts: Texts, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            mirror,
            texts: Arc::new(texts),
            notifier,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Handle operator text; `None` when it is not a command
    pub fn dispatch(&self, text: &str) -> Option<String> {
        let command = Command::parse(text)?;
        Some(self.execute(command))
    }

    pub fn execute(&self, command: Command) -> String {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::Interval(minutes) => self.set_interval(minutes),
            Command::Add(refs) => self.add(&refs),
            Command::Remove(refs) => self.remove(&refs),
            Command::Chats => self.chats(),
            Command::Help => self.help(),
            Command::Invalid { command, arg } => fill(
                &self.texts.invalid_argument,
                &[("command", &command), ("arg", &arg)],
            ),
        }
    }

    /// Wait for every loop worker to finish
    pub fn join(&self) {
        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for handle in workers {
            if handle.join().is_err() {
                error!("Mirror worker panicked");
            }
        }
    }

    fn start(&self) -> String {
        let control = self.mirror.control();
        let Some(session) = control.start() else {
            return self.texts.already_started.clone();
        };

        let mirror = Arc::clone(&self.mirror);
        let notifier = Arc::clone(&self.notifier);
        let texts = Arc::clone(&self.texts);

        // A worker of an earlier session exits on its own after its pause
        let spawned = std::thread::Builder::new()
            .name("mirror-loop".to_string())
            .spawn(move || {
                if let Err(e) = mirror.run_session(session) {
                    let template = if e.is_fatal() {
                        &texts.access_denied
                    } else {
                        &texts.error
                    };
                    notifier.notify(&fill(template, &[("error", &e.to_string())]));
                }
            });

        match spawned {
            Ok(handle) => {
                let mut workers = self.workers.lock().unwrap();
                workers.retain(|worker| !worker.is_finished());
                if !workers.is_empty() {
                    debug!("{} superseded mirror worker(s) still finishing", workers.len());
                }
                workers.push(handle);
                self.texts.start.clone()
            }
            Err(e) => {
                control.stop();
                error!("Failed to spawn mirror worker: {}", e);
                fill(&self.texts.error, &[("error", &e.to_string())])
            }
        }
    }

    fn stop(&self) -> String {
        let control = self.mirror.control();
        if !control.stop() {
            return self.texts.not_started.clone();
        }
        let interval = format_interval(control.interval());
        fill(&self.texts.stop, &[("interval", &interval)])
    }

    fn set_interval(&self, minutes: u64) -> String {
        let control = self.mirror.control();
        let prev = format_interval(control.interval());
        control.set_interval(Duration::from_secs(minutes.saturating_mul(60)));
        let cur = format_interval(control.interval());
        info!("Interval changed from {} to {}", prev, cur);
        fill(&self.texts.interval, &[("prev", &prev), ("cur", &cur)])
    }

    fn add(&self, refs: &[ChannelRef]) -> String {
        if let [channel] = refs {
            let name = channel.to_string();
            return match self.mirror.register_channel(channel) {
                Ok(_) => fill(&self.texts.add, &[("channel", &name)]),
                Err(e) => self.failure_reply(&name, e),
            };
        }

        let delay = Duration::from_millis(self.mirror.settings().add_delay_ms);
        let (mut successful, mut unsuccessful) = (Vec::new(), Vec::new());

        for channel in refs {
            match self.mirror.register_channel(channel) {
                Ok(_) => {
                    successful.push(channel.to_string());
                    self.mirror.sleeper().sleep(delay);
                }
                Err(e) => {
                    warn!("Failed to add {}: {}", channel, e);
                    unsuccessful.push(channel.to_string());
                }
            }
        }

        self.multiple_reply(&self.texts.multiple_add, &successful, &unsuccessful)
    }

    fn remove(&self, refs: &[ChannelRef]) -> String {
        if let [channel] = refs {
            let name = channel.to_string();
            return match self.mirror.remove_channel(channel) {
                Ok(_) => fill(&self.texts.rem, &[("channel", &name)]),
                Err(e) => self.failure_reply(&name, e),
            };
        }

        let (mut successful, mut unsuccessful) = (Vec::new(), Vec::new());
        for channel in refs {
            match self.mirror.remove_channel(channel) {
                Ok(_) => successful.push(channel.to_string()),
                Err(e) => {
                    warn!("Failed to remove {}: {}", channel, e);
                    unsuccessful.push(channel.to_string());
                }
            }
        }

        self.multiple_reply(&self.texts.multiple_rem, &successful, &unsuccessful)
    }

    fn chats(&self) -> String {
        let state = match self.mirror.tracked() {
            Ok(state) => state,
            Err(e) => return fill(&self.texts.error, &[("error", &e.to_string())]),
        };
        if state.is_empty() {
            return self.texts.chats_empty.clone();
        }

        let lines: Vec<String> = state
            .channel_ids()
            .into_iter()
            .map(|id| match self.mirror.resolve(&ChannelRef::Id(id)) {
                Ok(info) => self.describe(&info),
                Err(e) => {
                    warn!("Failed to resolve channel {}: {}", id, e);
                    format!("{} ({})", id, self.texts.unavailable_channel)
                }
            })
            .collect();

        fill(&self.texts.chats, &[("chats", &bullet_list(&lines))])
    }

    fn help(&self) -> String {
        let interval = format_interval(self.mirror.control().interval());
        fill(
            &self.texts.help,
            &[("commands", &self.texts.command_list()), ("interval", &interval)],
        )
    }

    fn describe(&self, info: &ChatInfo) -> String {
        match &info.handle {
            Some(handle) => format!("{} (t.me/{})", info.title, handle),
            None => format!("{} ({})", info.title, self.texts.private_channel),
        }
    }

    fn failure_reply(&self, channel: &str, error: SyncError) -> String {
        let template = match &error {
            SyncError::NotTracked(_) => &self.texts.not_found,
            e if e.is_not_found() => &self.texts.invalid_username,
            e => {
                error!("Command failed for {}: {}", channel, e);
                if e.is_fatal() {
                    self.notifier.notify(&fill(
                        &self.texts.access_denied,
                        &[("error", &e.to_string())],
                    ));
                }
                &self.texts.error
            }
        };
        fill(template, &[("channel", channel), ("error", &error.to_string())])
    }

    fn multiple_reply(&self, template: &str, successful: &[String], unsuccessful: &[String]) -> String {
        let mut reply = fill(template, &[("successful", &bullet_list(successful))]);
        if !unsuccessful.is_empty() {
            reply.push('\n');
            reply.push_str(&fill(
                &self.texts.multiple_failed,
                &[("unsuccessful", &bullet_list(unsuccessful))],
            ));
        }
        reply
    }
}
