//! Photo upload pipeline
//!
//! Each photo is retried on its own counter with the backoff of its error
//! class. A photo that runs out of tries stops the pack; the unconsumed
//! rest is handed back so the caller can resume it after a pause.

use log::{error, info, warn};

use super::retry::RetryState;
use super::timing::Sleeper;
use crate::album::{AlbumApi, AlbumError, ErrorClass};
use crate::config::RetrySettings;
use crate::models::{AlbumId, MessageId, PhotoId, UploadBatch, UploadItem};

/// Why a single photo could not be uploaded
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Out of tries uploading message {message_id} after {attempts} attempts (last error: {class})")]
    OutOfTries {
        message_id: MessageId,
        class: ErrorClass,
        attempts: u32,
    },

    /// Not retried; the photo is dropped and the pack continues
    #[error("Upload of message {message_id} rejected: {source}")]
    Rejected {
        message_id: MessageId,
        #[source]
        source: AlbumError,
    },
}

/// Result of one pass over a pack
#[derive(Debug, Default)]
pub struct PackOutcome {
    pub uploaded: Vec<PhotoId>,
    /// Items dropped without retry (expired credentials)
    pub rejected: Vec<MessageId>,
    /// Unconsumed items, starting with the one that ran out of tries
    pub remainder: UploadBatch,
}

/// Totals for a pack including its resumptions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: usize,
    pub rejected: Vec<MessageId>,
    /// Items still unconsumed when the pack retry ceiling was reached
    pub dropped: Vec<MessageId>,
    pub pack_retries: u32,
}

pub struct UploadPipeline<'a> {
    album: &'a dyn AlbumApi,
    settings: &'a RetrySettings,
    sleeper: &'a dyn Sleeper,
}

impl<'a> UploadPipeline<'a> {
    pub fn new(album: &'a dyn AlbumApi, settings: &'a RetrySettings, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            album,
            settings,
            sleeper,
        }
    }

    /// Upload one photo: acquire a ticket, transfer, finalize with caption
    pub fn upload_photo(&self, album_id: AlbumId, item: &UploadItem) -> Result<PhotoId, UploadError> {
        let mut state = RetryState::new();

        loop {
            let result = self
                .album
                .upload(album_id, item.payload())
                .and_then(|ticket| self.album.finalize(&ticket, item.caption()));

            let error = match result {
                Ok(photo_id) => return Ok(photo_id),
                Err(e) => e,
            };

            let class = error.class();
            let Some(backoff) = self.settings.backoff_for(class) else {
                error!(
                    "{}. Message {} is dropped; update album-credentials.json",
                    error,
                    item.message_id()
                );
                return Err(UploadError::Rejected {
                    message_id: item.message_id(),
                    source: error,
                });
            };

            state.record(class);
            warn!(
                "Upload of message {} failed ({}), attempt {}/{}: {}",
                item.message_id(),
                class,
                state.attempts(),
                self.settings.photo_upload_max_tries,
                error
            );

            if state.is_exhausted(self.settings.photo_upload_max_tries) {
                return Err(UploadError::OutOfTries {
                    message_id: item.message_id(),
                    class,
                    attempts: state.attempts(),
                });
            }

            info!("Retrying message {} in {}s", item.message_id(), backoff.as_secs());
            self.sleeper.sleep(backoff);
        }
    }

    /// Upload items in order until one runs out of tries
    pub fn upload_pack(&self, album_id: AlbumId, mut items: UploadBatch) -> PackOutcome {
        let mut outcome = PackOutcome::default();
        let total = items.len();

        for index in 0..total {
            if index > 0 {
                self.sleeper.sleep(self.settings.upload_delay());
            }

            match self.upload_photo(album_id, &items[index]) {
                Ok(photo_id) => {
                    info!("Uploaded {}/{}", index + 1, total);
                    outcome.uploaded.push(photo_id);
                }
                Err(UploadError::Rejected { message_id, .. }) => {
                    outcome.rejected.push(message_id);
                }
                Err(e @ UploadError::OutOfTries { .. }) => {
                    warn!("{}. {} items left in pack", e, total - index);
                    outcome.remainder = items.split_off(index);
                    return outcome;
                }
            }
        }

        outcome
    }

    /// Upload a pack, resuming its remainder after each failed pass
    ///
    /// The remainder is resumed at most `pack_upload_max_tries` times, each
    /// after the pack-fail pause. Whatever is left after that is dropped.
    pub fn upload_with_resume(&self, album_id: AlbumId, items: UploadBatch) -> UploadReport {
        let mut report = UploadReport::default();
        let mut pending = items;

        loop {
            let outcome = self.upload_pack(album_id, pending);
            report.uploaded += outcome.uploaded.len();
            report.rejected.extend(outcome.rejected);

            if outcome.remainder.is_empty() {
                break;
            }

            if report.pack_retries >= self.settings.pack_upload_max_tries {
                warn!(
                    "Pack retry ceiling reached, dropping {} items",
                    outcome.remainder.len()
                );
                report.dropped = outcome.remainder.iter().map(|i| i.message_id()).collect();
                break;
            }

            report.pack_retries += 1;
            let backoff = self.settings.pack_fail_backoff();
            warn!(
                "Pack failed with {} items left. Resuming in {}s ({}/{})",
                outcome.remainder.len(),
                backoff.as_secs(),
                report.pack_retries,
                self.settings.pack_upload_max_tries
            );
            self.sleeper.sleep(backoff);
            pending = outcome.remainder;
        }

        report
    }
}
