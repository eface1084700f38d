//! In-memory chat source
//!
//! Holds channel histories in process. Used by tests and as a stand-in
//! before a real chat client is wired up.

use anyhow::anyhow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ChatError, ChatSource};
use crate::models::{ChannelId, ChannelRef, ChatInfo, Message, MessageId};

struct ChannelData {
    info: ChatInfo,
    messages: BTreeMap<MessageId, Message>,
}

/// In-memory implementation of ChatSource
///
/// Records every history request so tests can assert fetch windows.
pub struct InMemoryChatSource {
    channels: RwLock<HashMap<ChannelId, ChannelData>>,
    failing_downloads: RwLock<HashSet<MessageId>>,
    history_calls: RwLock<Vec<(ChannelId, usize, usize)>>,
    media_group_calls: AtomicUsize,
}

impl InMemoryChatSource {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            failing_downloads: RwLock::new(HashSet::new()),
            history_calls: RwLock::new(Vec::new()),
            media_group_calls: AtomicUsize::new(0),
        }
    }

    /// Register a channel with an empty history
    pub fn add_channel(&self, info: ChatInfo) {
        let mut channels = self.channels.write().unwrap();
        channels.insert(
            info.id,
            ChannelData {
                info,
                messages: BTreeMap::new(),
            },
        );
    }

    /// Append a message to its channel's history
    pub fn post(&self, message: Message) {
        let mut channels = self.channels.write().unwrap();
        if let Some(channel) = channels.get_mut(&message.channel_id) {
            channel.messages.insert(message.id, message);
        }
    }

    /// Make downloads of the given message fail
    pub fn fail_download(&self, id: MessageId) {
        self.failing_downloads.write().unwrap().insert(id);
    }

    /// Every `(channel, limit, offset)` passed to `history`
    pub fn history_calls(&self) -> Vec<(ChannelId, usize, usize)> {
        self.history_calls.read().unwrap().clone()
    }

    pub fn media_group_calls(&self) -> usize {
        self.media_group_calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.history_calls.write().unwrap().clear();
        self.media_group_calls.store(0, Ordering::SeqCst);
    }

    /// Payload served for a photo message
    pub fn payload_for(id: MessageId) -> Vec<u8> {
        format!("photo-{}", id).into_bytes()
    }
}

impl Default for InMemoryChatSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSource for InMemoryChatSource {
    fn resolve(&self, channel: &ChannelRef) -> Result<ChatInfo, ChatError> {
        let channels = self.channels.read().unwrap();
        channels
            .values()
            .map(|c| &c.info)
            .find(|info| match channel {
                ChannelRef::Id(id) => info.id == *id,
                ChannelRef::Handle(handle) => info.handle.as_deref() == Some(handle.as_str()),
                ChannelRef::Title(title) => info.title == *title,
            })
            .cloned()
            .ok_or_else(|| ChatError::NotFound(channel.to_string()))
    }

    fn history(
        &self,
        channel: ChannelId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, ChatError> {
        self.history_calls
            .write()
            .unwrap()
            .push((channel, limit, offset));

        let channels = self.channels.read().unwrap();
        let data = channels
            .get(&channel)
            .ok_or_else(|| ChatError::NotFound(channel.to_string()))?;

        Ok(data
            .messages
            .values()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn media_group(
        &self,
        channel: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<Vec<Message>>, ChatError> {
        self.media_group_calls.fetch_add(1, Ordering::SeqCst);

        let channels = self.channels.read().unwrap();
        let data = channels
            .get(&channel)
            .ok_or_else(|| ChatError::NotFound(channel.to_string()))?;

        let Some(group_id) = data
            .messages
            .get(&message_id)
            .and_then(|m| m.media_group_id.clone())
        else {
            return Ok(None);
        };

        Ok(Some(
            data.messages
                .values()
                .filter(|m| m.media_group_id.as_deref() == Some(group_id.as_str()))
                .cloned()
                .collect(),
        ))
    }

    fn download(&self, message: &Message) -> Result<Vec<u8>, ChatError> {
        if self.failing_downloads.read().unwrap().contains(&message.id) {
            return Err(anyhow!("download of message {} failed", message.id).into());
        }
        Ok(Self::payload_for(message.id))
    }
}
