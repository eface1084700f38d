//! Destination album identifiers

use serde::{Deserialize, Serialize};

/// Identifier of a destination album
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumId(pub i64);

impl AlbumId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for AlbumId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a photo saved into an album
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhotoId(pub i64);

/// Album summary as listed by the album collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumInfo {
    pub id: AlbumId,
    pub title: String,
}

impl AlbumInfo {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id: AlbumId(id),
            title: title.into(),
        }
    }
}
