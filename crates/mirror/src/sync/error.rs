//! Engine-level errors

use crate::album::{AlbumError, ErrorClass};
use crate::chat::ChatError;

/// Errors surfaced by channel management and the cycle loop
///
/// Only [`SyncError::AccessDenied`] stops the loop; everything else is
/// logged and scoped to one channel or one command.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Album store denied access: {0}")]
    AccessDenied(#[source] AlbumError),

    #[error(transparent)]
    Album(AlbumError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Channel is not tracked: {0}")]
    NotTracked(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SyncError {
    /// Whether the error must stop the mirroring loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }

    /// Whether the error points at a bad channel reference
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Chat(ChatError::NotFound(_)) | Self::NotTracked(_))
    }
}

impl From<AlbumError> for SyncError {
    fn from(error: AlbumError) -> Self {
        match error.class() {
            ErrorClass::AccessDenied => Self::AccessDenied(error),
            _ => Self::Album(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_is_fatal() {
        let error: SyncError = AlbumError::AccessDenied("photos.getAlbums".into()).into();
        assert!(error.is_fatal());

        let error: SyncError = AlbumError::RateLimited("photos.getAlbums".into()).into();
        assert!(!error.is_fatal());
    }

    #[test]
    fn test_not_found() {
        let error: SyncError = ChatError::NotFound("@nope".into()).into();
        assert!(error.is_not_found());
        assert!(!error.is_fatal());
    }
}
