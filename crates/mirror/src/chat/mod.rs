//! Source chat collaborator
//!
//! The mirror engine reads channels through the [`ChatSource`] trait. The
//! real client (session bootstrap, MTProto transport) lives outside this
//! crate; [`InMemoryChatSource`] backs tests and local runs.

mod memory;

use std::time::Duration;

use crate::models::{ChannelId, ChannelRef, ChatInfo, Message, MessageId};

pub use memory::InMemoryChatSource;

/// Errors reported by the chat collaborator
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Channel unreachable or reference unresolvable
    #[error("Channel not found: {0}")]
    NotFound(String),

    /// Platform asked us to back off for the given duration
    #[error("Flood wait of {} seconds", .0.as_secs())]
    FloodWait(Duration),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Read access to source channels
pub trait ChatSource: Send + Sync {
    /// Resolve a numeric id, handle or title to a channel
    fn resolve(&self, channel: &ChannelRef) -> Result<ChatInfo, ChatError>;

    /// Fetch up to `limit` messages, newest first, skipping the `offset` newest
    fn history(
        &self,
        channel: ChannelId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, ChatError>;

    /// Members of the media group containing the message, oldest first.
    ///
    /// Returns `None` when the message is not part of a group.
    fn media_group(
        &self,
        channel: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<Vec<Message>>, ChatError>;

    /// Download the photo attached to a message
    fn download(&self, message: &Message) -> Result<Vec<u8>, ChatError>;
}
