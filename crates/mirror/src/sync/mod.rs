//! Mirroring engine
//!
//! Cycle orchestration, batch construction, caption lookup and the
//! classified-retry upload pipeline. Everything runs synchronously on the
//! caller's thread; waits go through an injectable [`Sleeper`].

mod batch;
mod caption;
mod engine;
mod error;
mod pipeline;
mod retry;
mod timing;

pub use batch::BatchBuilder;
pub use caption::{CaptionResolver, MAX_CAPTION_ATTEMPTS};
pub use engine::{ChannelStats, CycleStats, LoopControl, Mirror};
pub use error::SyncError;
pub use pipeline::{PackOutcome, UploadError, UploadPipeline, UploadReport};
pub use retry::{RetryPolicy, RetryState};
pub use timing::{RecordingSleeper, Sleeper, ThreadSleeper, format_interval};
