//! Offline chat source loaded from a channel export
//!
//! The export is a JSON document with the channels and their messages:
//! `{"channels": [{"id", "title", "handle"}], "messages": [...]}`.

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::path::Path;

use mirror::{ChatInfo, InMemoryChatSource, Message};

#[derive(Debug, Deserialize)]
struct ChannelExport {
    channels: Vec<ChatInfo>,
    #[serde(default)]
    messages: Vec<Message>,
}

/// Load an export into an in-memory chat source
pub fn load(path: &Path) -> Result<InMemoryChatSource> {
    let export: ChannelExport = config::load_json_file(path)
        .with_context(|| format!("Failed to load channel export {}", path.display()))?;

    let source = InMemoryChatSource::new();
    let (channels, messages) = (export.channels.len(), export.messages.len());
    for channel in export.channels {
        source.add_channel(channel);
    }
    for message in export.messages {
        source.post(message);
    }

    info!("Loaded {} channels and {} messages from {}", channels, messages, path.display());
    Ok(source)
}
