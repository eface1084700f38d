//! Per-channel batch construction
//!
//! Decides how far back to read a channel's history since the last synced
//! message, drops already-synced messages, and returns the rest oldest
//! first. A media group cut by the window edge is completed from older
//! history so a multi-photo post is never split across cycles.

use log::{debug, info, warn};

use super::retry::RetryPolicy;
use crate::chat::{ChatError, ChatSource};
use crate::models::{ChannelId, ChannelSyncState, Message};

pub struct BatchBuilder<'a> {
    chat: &'a dyn ChatSource,
    retry: &'a RetryPolicy<'a>,
    fresh_window: usize,
}

impl<'a> BatchBuilder<'a> {
    pub fn new(chat: &'a dyn ChatSource, retry: &'a RetryPolicy<'a>, fresh_window: usize) -> Self {
        Self {
            chat,
            retry,
            fresh_window,
        }
    }

    /// Number of newest messages to read for the channel
    ///
    /// A channel without synced ids gets the fresh window. Otherwise the
    /// window spans from the newest synced id to the newest posted id.
    pub fn window(&self, channel: ChannelId, state: &ChannelSyncState) -> Result<usize, ChatError> {
        let Some(last_synced) = state.last_synced_id() else {
            return Ok(self.fresh_window);
        };

        let newest = self
            .retry
            .chat_call("history", || self.chat.history(channel, 1, 0))?;

        Ok(newest
            .first()
            .map(|m| m.id.value().abs_diff(last_synced.value()) as usize)
            .unwrap_or(0))
    }

    /// Build the batch of new messages, oldest first
    ///
    /// Returns `None` when the channel has nothing new and was skipped
    /// without reading its history.
    pub fn build(
        &self,
        channel: ChannelId,
        state: &ChannelSyncState,
    ) -> Result<Option<Vec<Message>>, ChatError> {
        let limit = self.window(channel, state)?;
        if limit == 0 {
            info!("No new messages in channel {}", channel);
            return Ok(None);
        }
        info!("Found {} messages to check in channel {}", limit, channel);

        // 1. Read the window, newest first
        let fetched = self
            .retry
            .chat_call("history", || self.chat.history(channel, limit, 0))?;
        let fetched_count = fetched.len();

        // 2. Drop synced ids and flip to oldest first
        let mut batch: Vec<Message> = fetched
            .into_iter()
            .filter(|m| !state.is_synced(m.id))
            .collect();
        batch.reverse();

        // 3. Pull in the rest of a media group cut by the window edge
        self.complete_leading_group(channel, state, &mut batch, fetched_count)?;

        debug!("Batch for channel {} has {} messages", channel, batch.len());
        Ok(Some(batch))
    }

    fn complete_leading_group(
        &self,
        channel: ChannelId,
        state: &ChannelSyncState,
        batch: &mut Vec<Message>,
        fetched_count: usize,
    ) -> Result<(), ChatError> {
        let Some(oldest) = batch.first() else {
            return Ok(());
        };
        if oldest.media_group_id.is_none() {
            return Ok(());
        }

        let group = match self.chat.media_group(channel, oldest.id) {
            Ok(Some(group)) => group,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("Failed to read media group of message {}: {}", oldest.id, e);
                return Ok(());
            }
        };

        let Some(first_member) = group.iter().map(|m| m.id).min() else {
            return Ok(());
        };
        let missing = oldest.id.value() - first_member.value();
        if missing <= 0 {
            return Ok(());
        }

        debug!(
            "Extending window of channel {} by {} to complete media group",
            channel, missing
        );
        let older = self.retry.chat_call("history", || {
            self.chat.history(channel, missing as usize, fetched_count)
        })?;

        let mut older: Vec<Message> = older
            .into_iter()
            .filter(|m| !state.is_synced(m.id))
            .collect();
        older.reverse();
        older.append(batch);
        *batch = older;
        Ok(())
    }
}
