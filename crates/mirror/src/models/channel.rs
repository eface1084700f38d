//! Channel identifiers and resolved channel info

use serde::{Deserialize, Serialize};

/// Numeric identifier of a source channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub i64);

impl ChannelId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ChannelId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an operator refers to a channel
///
/// Resolution to a [`ChannelId`] is delegated to the chat collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    Id(ChannelId),
    /// Public handle, stored without the leading `@`
    Handle(String),
    /// Exact channel title
    Title(String),
}

impl ChannelRef {
    /// Parse operator input: a number, an `@handle`, or anything else as a title
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Some(handle) = input.strip_prefix('@') {
            return Self::Handle(handle.to_string());
        }
        match input.parse::<i64>() {
            Ok(id) => Self::Id(ChannelId(id)),
            Err(_) => Self::Title(input.to_string()),
        }
    }
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Handle(handle) => write!(f, "@{}", handle),
            Self::Title(title) => write!(f, "{}", title),
        }
    }
}

/// A channel as resolved by the chat collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: ChannelId,
    pub title: String,
    /// Public handle without `@`; `None` for private channels
    pub handle: Option<String>,
}

impl ChatInfo {
    pub fn new(id: impl Into<ChannelId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_ref() {
        assert_eq!(ChannelRef::parse("@cats"), ChannelRef::Handle("cats".to_string()));
        assert_eq!(
            ChannelRef::parse("-1001234"),
            ChannelRef::Id(ChannelId::new(-1001234))
        );
        assert_eq!(
            ChannelRef::parse(" Daily Cats "),
            ChannelRef::Title("Daily Cats".to_string())
        );
    }

    #[test]
    fn test_display_round_trips_handle() {
        assert_eq!(ChannelRef::parse("@cats").to_string(), "@cats");
    }
}
