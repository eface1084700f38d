//! Caption lookup for photo messages
//!
//! A photo in a chat often carries no text of its own: the caption sits on
//! another member of its media group, or on a message posted right before
//! or after it. The resolver walks the batch from the photo outward until a
//! caption turns up or the walk is exhausted.

use log::{debug, info, warn};

use crate::chat::ChatSource;
use crate::config::CaptionSettings;
use crate::models::Message;

/// Upper bound on lookup steps for one photo
pub const MAX_CAPTION_ATTEMPTS: u32 = 40;

pub struct CaptionResolver<'a> {
    chat: &'a dyn ChatSource,
    settings: &'a CaptionSettings,
}

impl<'a> CaptionResolver<'a> {
    pub fn new(chat: &'a dyn ChatSource, settings: &'a CaptionSettings) -> Self {
        Self { chat, settings }
    }

    /// Caption for `batch[index]`, or an empty string
    ///
    /// `batch` is ordered oldest first.
    pub fn resolve(&self, batch: &[Message], index: usize) -> String {
        let Some(message) = batch.get(index) else {
            return String::new();
        };

        match self.find(batch, index) {
            Some(caption) => {
                info!("Found caption for message {}", message.id);
                caption
            }
            None => {
                info!("No caption found for message {}", message.id);
                String::new()
            }
        }
    }

    fn find(&self, batch: &[Message], start: usize) -> Option<String> {
        let mut index = start;

        for attempt in 1..=MAX_CAPTION_ATTEMPTS {
            let message = batch.get(index)?;
            debug!(
                "Caption lookup {} for message {} at message {}",
                attempt, batch[start].id, message.id
            );

            if let Some(caption) = message.caption() {
                return Some(caption.to_string());
            }

            let group = self.group_of(message);
            if let Some(caption) = group.iter().find_map(|m| m.caption()) {
                return Some(caption.to_string());
            }

            index = self.step(batch, index, &group)?;
        }

        debug!(
            "Caption lookup for message {} gave up after {} attempts",
            batch[start].id, MAX_CAPTION_ATTEMPTS
        );
        None
    }

    /// Members of the message's media group; empty when it has none
    fn group_of(&self, message: &Message) -> Vec<Message> {
        if message.media_group_id.is_none() {
            return Vec::new();
        }

        match self.chat.media_group(message.channel_id, message.id) {
            Ok(group) => group.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to read media group of message {}: {}", message.id, e);
                Vec::new()
            }
        }
    }

    /// Pick the neighbor to look at next
    ///
    /// Neighbors are taken around the whole media group: the earlier-sent
    /// one sits before the group's first member, the later-sent one after
    /// its last member. The earlier-sent neighbor wins when it was posted
    /// within the epsilon, or within the wider window if it is a video.
    fn step(&self, batch: &[Message], index: usize, group: &[Message]) -> Option<usize> {
        let (first, last) = group_span(batch, index, group);

        let earlier = first.checked_sub(1);
        let later = Some(last + 1).filter(|i| *i < batch.len());

        match (earlier, later) {
            (None, None) => None,
            (Some(earlier), None) => Some(earlier),
            (None, Some(later)) => Some(later),
            (Some(earlier), Some(later)) => {
                if self.is_close(&batch[index], &batch[earlier]) {
                    Some(earlier)
                } else {
                    Some(later)
                }
            }
        }
    }

    fn is_close(&self, current: &Message, earlier: &Message) -> bool {
        let delta = (current.date - earlier.date).abs();
        delta < self.settings.epsilon()
            || (earlier.is_video() && delta < self.settings.video_epsilon())
    }
}

/// Batch positions of the first and last group member, or of the message
fn group_span(batch: &[Message], index: usize, group: &[Message]) -> (usize, usize) {
    let positions = batch
        .iter()
        .enumerate()
        .filter(|(_, m)| group.iter().any(|g| g.id == m.id))
        .map(|(i, _)| i);

    positions.fold((index, index), |(first, last), i| (first.min(i), last.max(i)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::InMemoryChatSource;
    use crate::models::{ChannelId, ChatInfo};
    use chrono::{TimeZone, Utc};

    const CHANNEL: ChannelId = ChannelId(1);

    fn at(seconds: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn source(messages: &[Message]) -> InMemoryChatSource {
        let source = InMemoryChatSource::new();
        source.add_channel(ChatInfo::new(1, "Cats"));
        for message in messages {
            source.post(message.clone());
        }
        source
    }

    #[test]
    fn test_own_caption_needs_no_lookup() {
        let batch = vec![Message::builder(1, CHANNEL).photo().text("cat").build()];
        let source = source(&batch);
        let settings = CaptionSettings::default();
        let resolver = CaptionResolver::new(&source, &settings);

        assert_eq!(resolver.resolve(&batch, 0), "cat");
        assert_eq!(source.media_group_calls(), 0);
    }

    #[test]
    fn test_caption_from_group_member() {
        let batch = vec![
            Message::builder(1, CHANNEL).photo().media_group("g").build(),
            Message::builder(2, CHANNEL).photo().media_group("g").build(),
            Message::builder(3, CHANNEL).media_group("g").text("album text").build(),
        ];
        let source = source(&batch);
        let settings = CaptionSettings::default();
        let resolver = CaptionResolver::new(&source, &settings);

        assert_eq!(resolver.resolve(&batch, 0), "album text");
        assert_eq!(source.media_group_calls(), 1);
    }

    #[test]
    fn test_earlier_neighbor_within_epsilon() {
        let batch = vec![
            Message::builder(1, CHANNEL).text("before").date(at(0)).build(),
            Message::builder(2, CHANNEL).photo().date(at(1)).build(),
            Message::builder(3, CHANNEL).text("after").date(at(5)).build(),
        ];
        let source = source(&batch);
        let settings = CaptionSettings::default();
        let resolver = CaptionResolver::new(&source, &settings);

        assert_eq!(resolver.resolve(&batch, 1), "before");
    }

    #[test]
    fn test_later_neighbor_when_earlier_is_far() {
        let batch = vec![
            Message::builder(1, CHANNEL).text("before").date(at(0)).build(),
            Message::builder(2, CHANNEL).photo().date(at(60)).build(),
            Message::builder(3, CHANNEL).text("after").date(at(61)).build(),
        ];
        let source = source(&batch);
        let settings = CaptionSettings::default();
        let resolver = CaptionResolver::new(&source, &settings);

        assert_eq!(resolver.resolve(&batch, 1), "after");
    }

    #[test]
    fn test_earlier_neighbor_is_taken_before_group_start() {
        let batch = vec![
            Message::builder(1, CHANNEL).text("before").date(at(0)).build(),
            Message::builder(2, CHANNEL).photo().media_group("g").date(at(1)).build(),
            Message::builder(3, CHANNEL).photo().media_group("g").date(at(1)).build(),
            Message::builder(4, CHANNEL).text("after").date(at(100)).build(),
        ];
        let source = source(&batch);
        let settings = CaptionSettings::default();
        let resolver = CaptionResolver::new(&source, &settings);

        assert_eq!(resolver.resolve(&batch, 2), "before");
        // One step past the whole group, not through its first member
        assert_eq!(source.media_group_calls(), 1);
    }

    #[test]
    fn test_later_neighbor_is_taken_after_group_end() {
        let batch = vec![
            Message::builder(1, CHANNEL).text("before").date(at(0)).build(),
            Message::builder(2, CHANNEL).photo().media_group("g").date(at(60)).build(),
            Message::builder(3, CHANNEL).photo().media_group("g").date(at(61)).build(),
            Message::builder(4, CHANNEL).text("after").date(at(62)).build(),
        ];
        let source = source(&batch);
        let settings = CaptionSettings::default();
        let resolver = CaptionResolver::new(&source, &settings);

        assert_eq!(resolver.resolve(&batch, 1), "after");
        assert_eq!(source.media_group_calls(), 1);
    }

    #[test]
    fn test_video_neighbor_gets_wider_window() {
        let batch = vec![
            Message::builder(1, CHANNEL).video().text("clip").date(at(0)).build(),
            Message::builder(2, CHANNEL).photo().date(at(20)).build(),
            Message::builder(3, CHANNEL).text("after").date(at(21)).build(),
        ];
        let source = source(&batch);
        let settings = CaptionSettings::default();
        let resolver = CaptionResolver::new(&source, &settings);

        assert_eq!(resolver.resolve(&batch, 1), "clip");
    }

    #[test]
    fn test_edges_fall_back_to_existing_neighbor() {
        let batch = vec![
            Message::builder(1, CHANNEL).text("first").date(at(0)).build(),
            Message::builder(2, CHANNEL).photo().date(at(600)).build(),
        ];
        let source = source(&batch);
        let settings = CaptionSettings::default();
        let resolver = CaptionResolver::new(&source, &settings);

        // No later neighbor: the earlier one is used regardless of distance
        assert_eq!(resolver.resolve(&batch, 1), "first");
    }

    #[test]
    fn test_lone_message_has_empty_caption() {
        let batch = vec![Message::builder(1, CHANNEL).photo().build()];
        let source = source(&batch);
        let settings = CaptionSettings::default();
        let resolver = CaptionResolver::new(&source, &settings);

        assert_eq!(resolver.resolve(&batch, 0), "");
    }

    #[test]
    fn test_lookup_is_bounded() {
        // Two captionless photos in separate groups bounce between each other
        let batch = vec![
            Message::builder(1, CHANNEL).photo().media_group("a").date(at(0)).build(),
            Message::builder(2, CHANNEL).photo().media_group("b").date(at(0)).build(),
        ];
        let source = source(&batch);
        let settings = CaptionSettings::default();
        let resolver = CaptionResolver::new(&source, &settings);

        assert_eq!(resolver.resolve(&batch, 1), "");
        assert_eq!(source.media_group_calls(), MAX_CAPTION_ATTEMPTS as usize);
    }

    #[test]
    fn test_group_span() {
        let batch = vec![
            Message::builder(1, CHANNEL).build(),
            Message::builder(2, CHANNEL).media_group("g").build(),
            Message::builder(3, CHANNEL).media_group("g").build(),
            Message::builder(4, CHANNEL).build(),
        ];
        assert_eq!(group_span(&batch, 2, &batch[1..3]), (1, 2));
        assert_eq!(group_span(&batch, 3, &[]), (3, 3));
    }
}
