//! Per-channel cursor state for incremental mirroring

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{AlbumId, ChannelId, MessageId};

/// Number of synced ids remembered per channel.
///
/// Only the maximum drives the fetch window; the rest filter out overlap
/// between consecutive windows.
pub const SYNCED_ID_CAPACITY: usize = 5;

/// Tracks mirroring progress for one source channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSyncState {
    pub channel_id: ChannelId,
    /// Most recent synced ids, ascending, at most [`SYNCED_ID_CAPACITY`]
    last_synced_message_ids: Vec<MessageId>,
    /// Destination album, resolved lazily on registration
    pub album_id: Option<AlbumId>,
}

impl ChannelSyncState {
    /// Create state for a freshly registered channel
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            last_synced_message_ids: Vec::new(),
            album_id: None,
        }
    }

    /// Set the destination album
    pub fn with_album(mut self, album_id: AlbumId) -> Self {
        self.album_id = Some(album_id);
        self
    }

    /// A channel is mirrored only once its album is resolved
    pub fn is_active(&self) -> bool {
        self.album_id.is_some()
    }

    pub fn last_synced_ids(&self) -> &[MessageId] {
        &self.last_synced_message_ids
    }

    /// Newest synced id, `None` if nothing was mirrored yet
    pub fn last_synced_id(&self) -> Option<MessageId> {
        self.last_synced_message_ids.last().copied()
    }

    pub fn is_synced(&self, id: MessageId) -> bool {
        self.last_synced_message_ids.binary_search(&id).is_ok()
    }

    /// Record ids as synced, keeping only the newest few
    pub fn mark_synced(&mut self, ids: impl IntoIterator<Item = MessageId>) {
        self.last_synced_message_ids.extend(ids);
        self.last_synced_message_ids.sort_unstable();
        self.last_synced_message_ids.dedup();

        let len = self.last_synced_message_ids.len();
        if len > SYNCED_ID_CAPACITY {
            self.last_synced_message_ids.drain(..len - SYNCED_ID_CAPACITY);
        }
    }
}

/// Persisted form of a channel entry; the channel id is the map key
#[derive(Serialize, Deserialize)]
struct ChannelEntry {
    #[serde(default)]
    last_synced_message_ids: Vec<MessageId>,
    #[serde(default)]
    album_id: Option<AlbumId>,
}

/// All tracked channels, in registration order
///
/// Loaded and replaced as one document; never merged partially.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    channels: Vec<ChannelSyncState>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn contains(&self, channel_id: ChannelId) -> bool {
        self.get(channel_id).is_some()
    }

    pub fn get(&self, channel_id: ChannelId) -> Option<&ChannelSyncState> {
        self.channels.iter().find(|c| c.channel_id == channel_id)
    }

    pub fn get_mut(&mut self, channel_id: ChannelId) -> Option<&mut ChannelSyncState> {
        self.channels.iter_mut().find(|c| c.channel_id == channel_id)
    }

    /// Get the channel's state, registering it at the end if missing
    pub fn entry(&mut self, channel_id: ChannelId) -> &mut ChannelSyncState {
        match self.channels.iter().position(|c| c.channel_id == channel_id) {
            Some(index) => &mut self.channels[index],
            None => {
                self.channels.push(ChannelSyncState::new(channel_id));
                let last = self.channels.len() - 1;
                &mut self.channels[last]
            }
        }
    }

    pub fn remove(&mut self, channel_id: ChannelId) -> Option<ChannelSyncState> {
        let index = self.channels.iter().position(|c| c.channel_id == channel_id)?;
        Some(self.channels.remove(index))
    }

    /// Channel ids in registration order
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.iter().map(|c| c.channel_id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelSyncState> {
        self.channels.iter()
    }
}

impl Serialize for SyncState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.channels.len()))?;
        for channel in &self.channels {
            let entry = ChannelEntry {
                last_synced_message_ids: channel.last_synced_message_ids.clone(),
                album_id: channel.album_id,
            };
            map.serialize_entry(&channel.channel_id.to_string(), &entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SyncState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SyncStateVisitor;

        impl<'de> Visitor<'de> for SyncStateVisitor {
            type Value = SyncState;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of channel ids to channel state")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SyncState, A::Error> {
                let mut state = SyncState::new();
                while let Some((key, entry)) = access.next_entry::<String, ChannelEntry>()? {
                    let id: i64 = key
                        .parse()
                        .map_err(|_| de::Error::custom(format!("invalid channel id: {key}")))?;
                    let channel = state.entry(ChannelId(id));
                    channel.album_id = entry.album_id;
                    channel.mark_synced(entry.last_synced_message_ids);
                }
                Ok(state)
            }
        }

        deserializer.deserialize_map(SyncStateVisitor)
    }
}
