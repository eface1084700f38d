//! Mirror crate - Photo mirroring from chat channels into albums
//!
//! This crate provides:
//! - Domain models (Message, ChannelSyncState, SyncState, UploadItem)
//! - Chat and album collaborator traits with in-memory implementations
//! - A blocking HTTP client for a VK-style photo album API
//! - Storage of the per-channel cursor document
//! - The mirroring engine: batch building, caption lookup, classified
//!   retries and pack resumption
//! - A thin operator command shell
//!
//! The engine is synchronous and executor-agnostic; the embedding
//! application supplies the real chat client and command transport.

pub mod album;
pub mod chat;
pub mod commands;
pub mod config;
pub mod models;
pub mod storage;
pub mod sync;

pub use album::{AlbumApi, AlbumError, ErrorClass, HttpAlbumClient, InMemoryAlbum, UploadTicket};
pub use chat::{ChatError, ChatSource, InMemoryChatSource};
pub use commands::{Command, CommandShell, LogNotifier, Notifier, Texts};
pub use crate::config::{AlbumCredentials, CaptionSettings, MirrorSettings, RetrySettings};
pub use models::{
    AlbumId, AlbumInfo, ChannelId, ChannelRef, ChannelSyncState, ChatInfo, MediaKind, Message,
    MessageId, PhotoId, SyncState, UploadBatch, UploadItem,
};
pub use storage::{InMemoryStateStore, JsonStateStore, StateStore};
pub use sync::{
    // Engine
    ChannelStats, CycleStats, LoopControl, Mirror, SyncError,
    // Pipeline pieces
    BatchBuilder, CaptionResolver, PackOutcome, RetryPolicy, UploadError, UploadPipeline,
    UploadReport,
    // Timing
    RecordingSleeper, Sleeper, ThreadSleeper, format_interval,
};
