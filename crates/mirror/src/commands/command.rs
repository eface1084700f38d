//! Operator command parsing

use crate::models::ChannelRef;

/// A parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    /// New pause between cycles, in minutes
    Interval(u64),
    Add(Vec<ChannelRef>),
    Remove(Vec<ChannelRef>),
    Chats,
    Help,
    /// Known command with a missing or unusable argument
    Invalid { command: String, arg: String },
}

impl Command {
    /// Parse operator text; `None` when it is not a command
    ///
    /// `.add`/`.rem` take either several `@handles` separated by spaces, or
    /// a single channel title or numeric id spanning the rest of the line.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (name, arg) = match text.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (text, ""),
        };

        let command = match name {
            ".start" => Self::Start,
            ".stop" => Self::Stop,
            ".chats" => Self::Chats,
            ".help" => Self::Help,
            ".interval" => match arg.parse::<u64>() {
                Ok(minutes) if minutes > 0 && minutes.checked_mul(60).is_some() => {
                    Self::Interval(minutes)
                }
                _ => Self::invalid(name, arg),
            },
            ".add" | ".rem" => {
                let Some(refs) = parse_refs(arg) else {
                    return Some(Self::invalid(name, arg));
                };
                if name == ".add" {
                    Self::Add(refs)
                } else {
                    Self::Remove(refs)
                }
            }
            _ => return None,
        };
        Some(command)
    }

    fn invalid(command: &str, arg: &str) -> Self {
        Self::Invalid {
            command: command.to_string(),
            arg: arg.to_string(),
        }
    }
}

fn parse_refs(arg: &str) -> Option<Vec<ChannelRef>> {
    if arg.is_empty() {
        return None;
    }
    if arg.starts_with('@') {
        return Some(arg.split_whitespace().map(ChannelRef::parse).collect());
    }
    Some(vec![ChannelRef::parse(arg)])
}
