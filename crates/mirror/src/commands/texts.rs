//! Reply templates for the command shell
//!
//! Templates use `{name}` placeholders. The bundle is loaded from
//! `texts.json` in the config directory when present, so replies can be
//! translated without rebuilding.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const TEXTS_FILE: &str = "texts.json";

/// One `.help` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandHelp {
    pub command: String,
    pub description: String,
}

impl CommandHelp {
    fn new(command: &str, description: &str) -> Self {
        Self {
            command: command.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Texts {
    pub help: String,
    pub descriptions: Vec<CommandHelp>,
    pub start: String,
    pub stop: String,
    pub interval: String,
    pub add: String,
    pub rem: String,
    pub multiple_add: String,
    pub multiple_rem: String,
    pub multiple_failed: String,
    pub chats: String,
    pub chats_empty: String,
    pub private_channel: String,
    pub unavailable_channel: String,
    pub already_started: String,
    pub not_started: String,
    pub invalid_username: String,
    pub invalid_argument: String,
    pub not_found: String,
    pub access_denied: String,
    pub error: String,
}

impl Default for Texts {
    fn default() -> Self {
        Self {
            help: "Commands:\n{commands}\n\nCurrent interval: {interval}".into(),
            descriptions: vec![
                CommandHelp::new("start", "start mirroring"),
                CommandHelp::new("stop", "stop mirroring"),
                CommandHelp::new("interval <minutes>", "set the pause between cycles"),
                CommandHelp::new("add <channel>...", "mirror channels into albums"),
                CommandHelp::new("rem <channel>...", "stop mirroring channels"),
                CommandHelp::new("chats", "list mirrored channels"),
                CommandHelp::new("help", "show this message"),
            ],
            start: "Mirroring started".into(),
            stop: "Mirroring stopped. Interval was {interval}".into(),
            interval: "Interval changed from {prev} to {cur}".into(),
            add: "Channel {channel} added".into(),
            rem: "Channel {channel} removed".into(),
            multiple_add: "Added channels:\n{successful}".into(),
            multiple_rem: "Removed channels:\n{successful}".into(),
            multiple_failed: "Failed:\n{unsuccessful}".into(),
            chats: "Mirrored channels:\n{chats}".into(),
            chats_empty: "No channels are mirrored".into(),
            private_channel: "private".into(),
            unavailable_channel: "unavailable".into(),
            already_started: "Mirroring is already started".into(),
            not_started: "Mirroring is not started".into(),
            invalid_username: "Channel {channel} does not exist".into(),
            invalid_argument: "Invalid argument for {command}: {arg}".into(),
            not_found: "Channel {channel} is not mirrored".into(),
            access_denied: "Mirroring stopped, album store denied access: {error}".into(),
            error: "Error: {error}".into(),
        }
    }
}

impl Texts {
    /// Load `texts.json` from the config directory, or the built-in texts
    pub fn load() -> Result<Self> {
        if config::config_exists(TEXTS_FILE) {
            return config::load_json(TEXTS_FILE);
        }
        Ok(Self::default())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse texts JSON")
    }

    /// Command list for `.help`, one per line
    pub fn command_list(&self) -> String {
        self.descriptions
            .iter()
            .map(|d| format!(".{} - {}", d.command, d.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Substitute `{name}` placeholders in a template
///
/// Substituted values are not scanned again, so a channel title or error
/// text may itself contain braces.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut text = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let placeholder = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match placeholder {
            Some((value, close)) => {
                text.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                text.push('{');
                rest = after;
            }
        }
    }
    text.push_str(rest);
    text
}

/// Bulleted list, one item per line
pub fn bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| format!("• {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_placeholders() {
        let text = fill("from {prev} to {cur}", &[("prev", "1 h"), ("cur", "2 h")]);
        assert_eq!(text, "from 1 h to 2 h");
        assert_eq!(fill("no {x}", &[]), "no {x}");
    }

    #[test]
    fn test_fill_does_not_rescan_values() {
        let text = fill(
            "{channel}: {error}",
            &[("channel", "{error} fans"), ("error", "timed out {channel}")],
        );
        assert_eq!(text, "{error} fans: timed out {channel}");
        assert_eq!(fill("{{cur}}", &[("cur", "1 h")]), "{1 h}");
    }

    #[test]
    fn test_partial_texts_use_defaults() {
        let texts = Texts::from_json(r#"{"start": "Go!"}"#).unwrap();
        assert_eq!(texts.start, "Go!");
        assert_eq!(texts.stop, Texts::default().stop);
        assert_eq!(texts.descriptions.len(), 7);
    }

    #[test]
    fn test_bullet_list() {
        assert_eq!(bullet_list(&["@a", "@b"]), "• @a\n• @b");
        assert_eq!(bullet_list::<&str>(&[]), "");
    }
}
