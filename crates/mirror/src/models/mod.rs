//! Domain models for mirrored channels, messages and albums

mod album;
mod channel;
mod message;
mod sync_state;
mod upload;

pub use album::{AlbumId, AlbumInfo, PhotoId};
pub use channel::{ChannelId, ChannelRef, ChatInfo};
pub use message::{MediaKind, Message, MessageBuilder, MessageId};
pub use sync_state::{ChannelSyncState, SYNCED_ID_CAPACITY, SyncState};
pub use upload::{MAX_CAPTION_CHARS, UploadBatch, UploadItem, truncate_caption};
