//! Upload items built from eligible photo messages

use super::MessageId;

/// Longest caption the album store accepts, in characters
pub const MAX_CAPTION_CHARS: usize = 2048;

/// Truncate a caption to [`MAX_CAPTION_CHARS`] characters
pub fn truncate_caption(caption: &str) -> String {
    match caption.char_indices().nth(MAX_CAPTION_CHARS) {
        Some((byte_index, _)) => caption[..byte_index].to_string(),
        None => caption.to_string(),
    }
}

/// One photo to upload: payload plus its resolved caption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    message_id: MessageId,
    payload: Vec<u8>,
    caption: String,
}

impl UploadItem {
    /// Create an item; the caption is truncated to the store's limit
    pub fn new(message_id: MessageId, payload: Vec<u8>, caption: &str) -> Self {
        Self {
            message_id,
            payload,
            caption: truncate_caption(caption),
        }
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }
}

/// Ordered items of one channel's cycle
pub type UploadBatch = Vec<UploadItem>;
