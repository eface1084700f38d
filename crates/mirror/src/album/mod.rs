//! Destination album collaborator
//!
//! This module provides:
//! - [`AlbumApi`], the operations the mirror engine needs from an album store
//! - [`AlbumError`] and its [`ErrorClass`] used to pick a retry backoff
//! - [`HttpAlbumClient`], a blocking client for a VK-style photo API
//! - [`InMemoryAlbum`], an in-process store with scripted failures

mod client;
mod memory;

use serde::{Deserialize, Serialize};

use crate::models::{AlbumId, AlbumInfo, PhotoId};

pub use client::HttpAlbumClient;
pub use memory::{AlbumOp, InMemoryAlbum, StoredPhoto};

/// Classification of a failed album call, keyed into the retry table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    MalformedResponse,
    InvalidTicket,
    AccessDenied,
    RateLimited,
    CredentialsExpired,
    Other,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MalformedResponse => "malformed-response",
            Self::InvalidTicket => "invalid-ticket",
            Self::AccessDenied => "access-denied",
            Self::RateLimited => "rate-limited",
            Self::CredentialsExpired => "credentials-expired",
            Self::Other => "unclassified",
        };
        f.write_str(name)
    }
}

/// Errors reported by the album collaborator
#[derive(Debug, thiserror::Error)]
pub enum AlbumError {
    #[error("Malformed response from {method}: {detail}")]
    MalformedResponse { method: String, detail: String },

    #[error("Upload ticket rejected by {0}")]
    InvalidTicket(String),

    #[error("Access denied while processing method {0} (maybe token has invalid rights)")]
    AccessDenied(String),

    #[error("Rate limited while processing method {0}")]
    RateLimited(String),

    #[error("Album token expired while processing method {0}")]
    CredentialsExpired(String),

    #[error("API error {code} on {method}: {message}")]
    Api {
        method: String,
        code: i64,
        message: String,
    },

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl AlbumError {
    /// Classify for the retry table
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedResponse { .. } => ErrorClass::MalformedResponse,
            Self::InvalidTicket(_) => ErrorClass::InvalidTicket,
            Self::AccessDenied(_) => ErrorClass::AccessDenied,
            Self::RateLimited(_) => ErrorClass::RateLimited,
            Self::CredentialsExpired(_) => ErrorClass::CredentialsExpired,
            Self::Api { .. } | Self::Transport(_) => ErrorClass::Other,
        }
    }

    /// Build an error of the given class, as a remote call to `method` would
    pub fn from_class(class: ErrorClass, method: &str) -> Self {
        let method = method.to_string();
        match class {
            ErrorClass::MalformedResponse => Self::MalformedResponse {
                method,
                detail: "response is not valid JSON".to_string(),
            },
            ErrorClass::InvalidTicket => Self::InvalidTicket(method),
            ErrorClass::AccessDenied => Self::AccessDenied(method),
            ErrorClass::RateLimited => Self::RateLimited(method),
            ErrorClass::CredentialsExpired => Self::CredentialsExpired(method),
            ErrorClass::Other => Self::Api {
                method,
                code: 10,
                message: "Internal server error".to_string(),
            },
        }
    }

    /// Map a remote error code to a classified error
    pub fn from_api(method: &str, code: i64, message: &str) -> Self {
        match code {
            6 | 9 | 29 => Self::RateLimited(method.to_string()),
            5 => Self::CredentialsExpired(method.to_string()),
            15 | 200 | 201 | 203 => Self::AccessDenied(method.to_string()),
            100 if message.contains("photos_list") => Self::InvalidTicket(method.to_string()),
            _ => Self::Api {
                method: method.to_string(),
                code,
                message: message.to_string(),
            },
        }
    }
}

/// Proof of a transferred photo, exchanged for a saved photo by `finalize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTicket {
    pub album_id: AlbumId,
    pub server: i64,
    pub photos_list: String,
    pub hash: String,
}

/// Album store operations used by the mirror engine
pub trait AlbumApi: Send + Sync {
    /// Create a private album
    fn create_album(&self, title: &str) -> Result<AlbumInfo, AlbumError>;

    fn delete_album(&self, album_id: AlbumId) -> Result<(), AlbumError>;

    /// Albums owned by the logged-in account
    fn list_albums(&self) -> Result<Vec<AlbumInfo>, AlbumError>;

    /// Acquire an upload target for the album and transfer the bytes
    fn upload(&self, album_id: AlbumId, payload: &[u8]) -> Result<UploadTicket, AlbumError>;

    /// Save a transferred photo with its caption
    fn finalize(&self, ticket: &UploadTicket, caption: &str) -> Result<PhotoId, AlbumError>;
}

/// Find an album whose title contains `title`
pub fn find_album_by_title(albums: &[AlbumInfo], title: &str) -> Option<AlbumInfo> {
    albums.iter().find(|a| a.title.contains(title)).cloned()
}
