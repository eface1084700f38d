//! Message model representing a post in a source channel

use super::ChannelId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a message within its channel
///
/// Ids are monotonic per channel: a larger id is a newer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl MessageId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of media attached to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Video,
    Other,
}

/// A single message fetched from a source channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// When the message was posted
    pub date: DateTime<Utc>,
    pub media: Option<MediaKind>,
    /// Message text, or the media caption for media messages
    pub text: Option<String>,
    /// Shared by all members of one multi-item post
    pub media_group_id: Option<String>,
}

impl Message {
    /// Create a new message builder
    pub fn builder(id: impl Into<MessageId>, channel_id: ChannelId) -> MessageBuilder {
        MessageBuilder::new(id.into(), channel_id)
    }

    pub fn is_photo(&self) -> bool {
        self.media == Some(MediaKind::Photo)
    }

    pub fn is_video(&self) -> bool {
        self.media == Some(MediaKind::Video)
    }

    /// Own text or caption, ignoring empty strings
    pub fn caption(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// Builder for creating Message instances
pub struct MessageBuilder {
    id: MessageId,
    channel_id: ChannelId,
    date: Option<DateTime<Utc>>,
    media: Option<MediaKind>,
    text: Option<String>,
    media_group_id: Option<String>,
}

impl MessageBuilder {
    pub fn new(id: MessageId, channel_id: ChannelId) -> Self {
        Self {
            id,
            channel_id,
            date: None,
            media: None,
            text: None,
            media_group_id: None,
        }
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn photo(mut self) -> Self {
        self.media = Some(MediaKind::Photo);
        self
    }

    pub fn video(mut self) -> Self {
        self.media = Some(MediaKind::Video);
        self
    }

    pub fn media(mut self, media: MediaKind) -> Self {
        self.media = Some(media);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn media_group(mut self, group_id: impl Into<String>) -> Self {
        self.media_group_id = Some(group_id.into());
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            channel_id: self.channel_id,
            date: self.date.unwrap_or_else(Utc::now),
            media: self.media,
            text: self.text,
            media_group_id: self.media_group_id,
        }
    }
}
