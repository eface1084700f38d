//! Operator command shell
//!
//! Parses `.start`, `.stop`, `.interval`, `.add`, `.rem`, `.chats` and
//! `.help`, runs them against a [`Mirror`](crate::sync::Mirror) and formats
//! replies from a [`Texts`] bundle. Transport of commands and replies is
//! left to the embedding application.

mod command;
mod notify;
mod shell;
mod texts;

pub use command::Command;
pub use notify::{LogNotifier, Notifier, RecordingNotifier};
pub use shell::CommandShell;
pub use texts::{CommandHelp, Texts, bullet_list, fill};
