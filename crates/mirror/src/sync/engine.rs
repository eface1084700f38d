//! Mirroring orchestrator
//!
//! [`Mirror`] owns the collaborators and runs the cycle: for every tracked
//! channel build a batch, resolve captions, download photos, upload them to
//! the channel's album and advance the channel's cursor. Channel management
//! (register, remove, album refresh) goes through the same state document.

use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::batch::BatchBuilder;
use super::caption::CaptionResolver;
use super::error::SyncError;
use super::pipeline::{UploadPipeline, UploadReport};
use super::retry::RetryPolicy;
use super::timing::{Sleeper, ThreadSleeper};
use crate::album::{AlbumApi, find_album_by_title};
use crate::chat::ChatSource;
use crate::config::MirrorSettings;
use crate::models::{
    AlbumId, AlbumInfo, ChannelRef, ChannelSyncState, ChatInfo, Message, SyncState, UploadBatch,
    UploadItem,
};
use crate::storage::StateStore;

/// Start/stop flag and cycle interval, shared with the command shell
///
/// Every start opens a new session. A loop still sleeping out its interval
/// from an earlier session exits instead of resuming next to the new one.
#[derive(Debug)]
pub struct LoopControl {
    running: AtomicBool,
    session: AtomicU64,
    interval_secs: AtomicU64,
}

impl LoopControl {
    pub fn new(interval: Duration) -> Self {
        Self {
            running: AtomicBool::new(false),
            session: AtomicU64::new(0),
            interval_secs: AtomicU64::new(interval.as_secs()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the loop as running and open a session; `None` if already running
    pub fn start(&self) -> Option<u64> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        Some(self.session.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn session(&self) -> u64 {
        self.session.load(Ordering::SeqCst)
    }

    /// Whether a loop of this session should keep cycling
    pub fn is_current(&self, session: u64) -> bool {
        self.is_running() && self.session() == session
    }

    /// Ask the loop to stop before its next cycle; false if it was not running
    pub fn stop(&self) -> bool {
        self.running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.load(Ordering::SeqCst))
    }

    /// Takes effect after the current pause
    pub fn set_interval(&self, interval: Duration) {
        self.interval_secs.store(interval.as_secs(), Ordering::SeqCst);
    }
}

/// Statistics from one channel's sync
#[derive(Debug, Clone, Default)]
pub struct ChannelStats {
    /// Nothing new; history was not read
    pub skipped: bool,
    /// Messages in the batch, all of which were marked synced
    pub messages: usize,
    pub upload: UploadReport,
}

/// Statistics from one cycle over all channels
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    pub channels_synced: usize,
    pub channels_skipped: usize,
    pub messages_seen: usize,
    pub photos_uploaded: usize,
    pub photos_dropped: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

pub struct Mirror {
    chat: Arc<dyn ChatSource>,
    album: Arc<dyn AlbumApi>,
    store: Arc<dyn StateStore>,
    sleeper: Arc<dyn Sleeper>,
    settings: MirrorSettings,
    control: Arc<LoopControl>,
    /// Serializes read-modify-write of the state document
    state_lock: Mutex<()>,
    /// Held for a whole cycle; loops of two sessions never cycle at once
    cycle_lock: Mutex<()>,
}

impl Mirror {
    pub fn new(
        chat: Arc<dyn ChatSource>,
        album: Arc<dyn AlbumApi>,
        store: Arc<dyn StateStore>,
        settings: MirrorSettings,
    ) -> Self {
        let control = Arc::new(LoopControl::new(settings.interval()));
        Self {
            chat,
            album,
            store,
            sleeper: Arc::new(ThreadSleeper),
            settings,
            control,
            state_lock: Mutex::new(()),
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    pub fn control(&self) -> Arc<LoopControl> {
        Arc::clone(&self.control)
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    /// Current state document
    pub fn tracked(&self) -> Result<SyncState, SyncError> {
        Ok(self.store.load()?)
    }

    /// Resolve a channel reference through the chat collaborator
    pub fn resolve(&self, channel: &ChannelRef) -> Result<ChatInfo, SyncError> {
        let retry = self.retry();
        Ok(retry.chat_call("resolve", || self.chat.resolve(channel))?)
    }

    /// Start mirroring a channel into an album named after it
    ///
    /// An existing album whose title contains the channel title is reused.
    /// Registering a tracked channel keeps its cursor and refreshes the album.
    pub fn register_channel(&self, channel: &ChannelRef) -> Result<ChatInfo, SyncError> {
        let info = self.resolve(channel)?;
        let album = self.ensure_album(&info.title)?;

        self.update_state(|state| {
            state.entry(info.id).album_id = Some(album.id);
        })?;

        info!(
            "Channel {} ({}) is mirrored to album {}",
            info.title, info.id, album.id
        );
        Ok(info)
    }

    /// Stop mirroring a channel and delete its album
    pub fn remove_channel(&self, channel: &ChannelRef) -> Result<ChatInfo, SyncError> {
        let info = self.resolve(channel)?;

        let state = self.store.load()?;
        let Some(entry) = state.get(info.id) else {
            return Err(SyncError::NotTracked(channel.to_string()));
        };

        let album_id = match entry.album_id {
            Some(id) => Some(id),
            None => self.find_album(&info.title)?.map(|a| a.id),
        };

        if let Some(album_id) = album_id {
            self.delete_album(album_id)?;
        }

        self.update_state(|state| {
            state.remove(info.id);
        })?;

        info!("Channel {} ({}) is no longer mirrored", info.title, info.id);
        Ok(info)
    }

    /// Re-resolve every tracked channel and make sure its album exists
    pub fn refresh_albums(&self) -> Result<(), SyncError> {
        let state = self.store.load()?;

        for channel_id in state.channel_ids() {
            match self.register_channel(&ChannelRef::Id(channel_id)) {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Skipping album refresh for channel {}: {}", channel_id, e),
            }
        }
        Ok(())
    }

    /// Run cycles of the current session until stopped or a fatal error
    ///
    /// Returns immediately unless [`LoopControl::start`] was called.
    pub fn run(&self) -> Result<(), SyncError> {
        self.run_session(self.control.session())
    }

    /// Run cycles while `session` is the current running session
    ///
    /// A restarted session waits for a cycle still in flight in the session
    /// it replaced; the replaced loop exits once that cycle is done.
    pub fn run_session(&self, session: u64) -> Result<(), SyncError> {
        if !self.control.is_current(session) {
            return Ok(());
        }
        info!("Mirroring started");

        let refreshed = {
            let _cycle = self.cycle_lock.lock().unwrap();
            if !self.control.is_current(session) {
                info!("Mirroring session {} superseded before its first cycle", session);
                return Ok(());
            }
            self.refresh_albums()
        };
        if let Err(e) = refreshed {
            return self.halt(session, e);
        }

        loop {
            let result = {
                let _cycle = self.cycle_lock.lock().unwrap();
                if !self.control.is_current(session) {
                    break;
                }
                self.cycle()
            };

            match result {
                Ok(stats) => info!(
                    "Cycle done in {}ms: {} uploaded, {} dropped, {} channels skipped",
                    stats.duration_ms,
                    stats.photos_uploaded,
                    stats.photos_dropped,
                    stats.channels_skipped
                ),
                Err(e) if e.is_fatal() => return self.halt(session, e),
                Err(e) => error!("Cycle failed: {}", e),
            }

            if !self.control.is_current(session) {
                break;
            }
            let interval = self.control.interval();
            debug!("Next cycle in {}s", interval.as_secs());
            self.sleeper.sleep(interval);
        }

        info!("Mirroring stopped");
        Ok(())
    }

    /// One pass over all tracked channels
    ///
    /// Waits for a cycle running in a loop session to finish first.
    pub fn run_cycle(&self) -> Result<CycleStats, SyncError> {
        let _cycle = self.cycle_lock.lock().unwrap();
        self.cycle()
    }

    fn cycle(&self) -> Result<CycleStats, SyncError> {
        let start = Instant::now();
        let mut stats = CycleStats::default();

        // Snapshot; management commands may change the document meanwhile
        let snapshot = self.store.load()?;

        for channel in snapshot.iter() {
            if !channel.is_active() {
                warn!("Channel {} has no album; skipping", channel.channel_id);
                stats.channels_skipped += 1;
                continue;
            }

            match self.sync_channel(channel) {
                Ok(channel_stats) if channel_stats.skipped => stats.channels_skipped += 1,
                Ok(channel_stats) => {
                    stats.channels_synced += 1;
                    stats.messages_seen += channel_stats.messages;
                    stats.photos_uploaded += channel_stats.upload.uploaded;
                    stats.photos_dropped +=
                        channel_stats.upload.dropped.len() + channel_stats.upload.rejected.len();
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("Failed to sync channel {}: {}", channel.channel_id, e);
                    stats.errors += 1;
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        Ok(stats)
    }

    /// Mirror new photos of one channel and advance its cursor
    pub fn sync_channel(&self, channel: &ChannelSyncState) -> Result<ChannelStats, SyncError> {
        let mut stats = ChannelStats::default();
        let channel_id = channel.channel_id;
        let Some(album_id) = channel.album_id else {
            stats.skipped = true;
            return Ok(stats);
        };

        let retry = self.retry();

        // 1. Build the batch of new messages
        let builder = BatchBuilder::new(self.chat.as_ref(), &retry, self.settings.fresh_window);
        let Some(batch) = builder.build(channel_id, channel)? else {
            stats.skipped = true;
            return Ok(stats);
        };
        stats.messages = batch.len();
        if batch.is_empty() {
            return Ok(stats);
        }

        // 2. Resolve captions and download photos
        let items = self.collect_items(&retry, &batch);

        // 3. Upload, resuming failed packs
        if !items.is_empty() {
            info!("Uploading {} photos from channel {}", items.len(), channel_id);
            let pipeline =
                UploadPipeline::new(self.album.as_ref(), &self.settings.retry, self.sleeper.as_ref());
            stats.upload = pipeline.upload_with_resume(album_id, items);
        }

        // 4. Advance the cursor over every message of the batch
        self.update_state(|state| match state.get_mut(channel_id) {
            Some(entry) => entry.mark_synced(batch.iter().map(|m| m.id)),
            None => debug!("Channel {} was removed during its sync", channel_id),
        })?;

        Ok(stats)
    }

    fn collect_items(&self, retry: &RetryPolicy<'_>, batch: &[Message]) -> UploadBatch {
        let resolver = CaptionResolver::new(self.chat.as_ref(), &self.settings.caption);
        let mut items = UploadBatch::new();

        for (index, message) in batch.iter().enumerate() {
            if !message.is_photo() {
                continue;
            }

            let caption = resolver.resolve(batch, index);
            match retry.chat_call("download", || self.chat.download(message)) {
                Ok(payload) => items.push(UploadItem::new(message.id, payload, &caption)),
                Err(e) => warn!("Skipping message {}: download failed: {}", message.id, e),
            }
        }
        items
    }

    fn ensure_album(&self, title: &str) -> Result<AlbumInfo, SyncError> {
        if let Some(album) = self.find_album(title)? {
            debug!("Reusing album {} for {}", album.id, title);
            return Ok(album);
        }

        let retry = self.retry();
        let album = retry.album_call("photos.createAlbum", || self.album.create_album(title))?;
        info!("Created album {} ({})", album.title, album.id);
        Ok(album)
    }

    fn find_album(&self, title: &str) -> Result<Option<AlbumInfo>, SyncError> {
        let retry = self.retry();
        let albums = retry.album_call("photos.getAlbums", || self.album.list_albums())?;
        Ok(find_album_by_title(&albums, title))
    }

    fn delete_album(&self, album_id: AlbumId) -> Result<(), SyncError> {
        let retry = self.retry();
        match retry.album_call("photos.deleteAlbum", || self.album.delete_album(album_id)) {
            Ok(()) => Ok(()),
            Err(e) => {
                let e = SyncError::from(e);
                if e.is_fatal() {
                    return Err(e);
                }
                warn!("Failed to delete album {}: {}", album_id, e);
                Ok(())
            }
        }
    }

    /// Read-modify-write the state document under the state lock
    fn update_state(&self, update: impl FnOnce(&mut SyncState)) -> Result<(), SyncError> {
        let _guard = self.state_lock.lock().unwrap();
        let mut state = self.store.load()?;
        update(&mut state);
        self.store.replace(&state)?;
        Ok(())
    }

    fn halt(&self, session: u64, error: SyncError) -> Result<(), SyncError> {
        error!("Mirroring stopped: {}", error);
        if self.control.session() == session {
            self.control.stop();
        }
        Err(error)
    }

    fn retry(&self) -> RetryPolicy<'_> {
        RetryPolicy::new(&self.settings.retry, self.sleeper.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::album::{AlbumOp, ErrorClass, InMemoryAlbum};
    use crate::chat::InMemoryChatSource;
    use crate::config::RetrySettings;
    use crate::models::{ChannelId, MessageId};
    use crate::storage::InMemoryStateStore;
    use crate::sync::timing::RecordingSleeper;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::thread;

    /// Holds the first sleep of `gate` until released; other sleeps return at once
    struct GateSleeper {
        gate: Duration,
        entered: Mutex<Option<Sender<()>>>,
        release: Mutex<Receiver<()>>,
    }

    impl GateSleeper {
        fn new(gate: Duration) -> (Arc<Self>, Receiver<()>, Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let sleeper = Arc::new(Self {
                gate,
                entered: Mutex::new(Some(entered_tx)),
                release: Mutex::new(release_rx),
            });
            (sleeper, entered_rx, release_tx)
        }
    }

    impl Sleeper for GateSleeper {
        fn sleep(&self, duration: Duration) {
            if duration != self.gate {
                return;
            }
            let entered = self.entered.lock().unwrap().take();
            if let Some(entered) = entered {
                let _ = entered.send(());
                let _ = self.release.lock().unwrap().recv();
            }
        }
    }

    struct Fixture {
        chat: Arc<InMemoryChatSource>,
        album: Arc<InMemoryAlbum>,
        store: Arc<InMemoryStateStore>,
        sleeper: Arc<RecordingSleeper>,
        mirror: Mirror,
    }

    fn fixture() -> Fixture {
        let chat = Arc::new(InMemoryChatSource::new());
        chat.add_channel(ChatInfo::new(1, "Cats").with_handle("cats"));
        let album = Arc::new(InMemoryAlbum::new());
        let store = Arc::new(InMemoryStateStore::new());
        let sleeper = Arc::new(RecordingSleeper::new());

        let settings = MirrorSettings {
            retry: RetrySettings::immediate(),
            ..MirrorSettings::default()
        };
        let mirror = Mirror::new(chat.clone(), album.clone(), store.clone(), settings)
            .with_sleeper(sleeper.clone());

        Fixture {
            chat,
            album,
            store,
            sleeper,
            mirror,
        }
    }

    #[test]
    fn test_loop_control() {
        let control = LoopControl::new(Duration::from_secs(3600));
        assert!(!control.stop());
        assert_eq!(control.start(), Some(1));
        assert_eq!(control.start(), None);
        assert!(control.is_current(1));

        control.set_interval(Duration::from_secs(60));
        assert_eq!(control.interval(), Duration::from_secs(60));
        assert!(control.stop());
        assert!(!control.is_running());

        // A restart supersedes the earlier session
        assert_eq!(control.start(), Some(2));
        assert!(!control.is_current(1));
        assert!(control.is_current(2));
    }

    #[test]
    fn test_register_creates_album_once() {
        let f = fixture();
        f.mirror.register_channel(&ChannelRef::parse("@cats")).unwrap();
        f.mirror.register_channel(&ChannelRef::parse("Cats")).unwrap();

        assert_eq!(f.album.albums().len(), 1);
        let state = f.mirror.tracked().unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.get(ChannelId(1)).unwrap().album_id, Some(f.album.albums()[0].id));
    }

    #[test]
    fn test_register_reuses_album_by_title_substring() {
        let f = fixture();
        let existing = f.album.insert_album("Mirror of Cats");
        f.mirror.register_channel(&ChannelRef::parse("@cats")).unwrap();

        assert_eq!(f.album.call_count(AlbumOp::Create), 0);
        let state = f.mirror.tracked().unwrap();
        assert_eq!(state.get(ChannelId(1)).unwrap().album_id, Some(existing.id));
    }

    #[test]
    fn test_register_unknown_channel() {
        let f = fixture();
        let err = f.mirror.register_channel(&ChannelRef::parse("@dogs")).unwrap_err();
        assert!(err.is_not_found());
        assert!(f.mirror.tracked().unwrap().is_empty());
    }

    #[test]
    fn test_remove_deletes_album_and_entry() {
        let f = fixture();
        f.mirror.register_channel(&ChannelRef::parse("@cats")).unwrap();
        f.mirror.remove_channel(&ChannelRef::parse("@cats")).unwrap();

        assert!(f.album.albums().is_empty());
        assert!(f.mirror.tracked().unwrap().is_empty());

        let err = f.mirror.remove_channel(&ChannelRef::parse("@cats")).unwrap_err();
        assert!(matches!(err, SyncError::NotTracked(_)));
    }

    #[test]
    fn test_sync_uploads_and_advances_cursor() {
        let f = fixture();
        f.mirror.register_channel(&ChannelRef::parse("@cats")).unwrap();
        f.chat.post(Message::builder(1, ChannelId(1)).photo().text("a").build());
        f.chat.post(Message::builder(2, ChannelId(1)).text("just text").build());
        f.chat.post(Message::builder(3, ChannelId(1)).photo().text("b").build());

        let stats = f.mirror.run_cycle().unwrap();
        assert_eq!(stats.photos_uploaded, 2);
        assert_eq!(stats.messages_seen, 3);

        let captions: Vec<String> = f.album.photos().into_iter().map(|p| p.caption).collect();
        assert_eq!(captions, vec!["a", "b"]);

        let state = f.mirror.tracked().unwrap();
        let entry = state.get(ChannelId(1)).unwrap();
        assert_eq!(entry.last_synced_ids(), &[MessageId(1), MessageId(2), MessageId(3)]);

        // Second cycle finds nothing new
        let stats = f.mirror.run_cycle().unwrap();
        assert_eq!(stats.channels_skipped, 1);
        assert_eq!(f.album.photos().len(), 2);
    }

    #[test]
    fn test_download_failure_skips_photo_but_advances_cursor() {
        let f = fixture();
        f.mirror.register_channel(&ChannelRef::parse("@cats")).unwrap();
        f.chat.post(Message::builder(1, ChannelId(1)).photo().build());
        f.chat.post(Message::builder(2, ChannelId(1)).photo().build());
        f.chat.fail_download(MessageId(1));

        f.mirror.run_cycle().unwrap();

        assert_eq!(f.album.photos().len(), 1);
        let state = f.mirror.tracked().unwrap();
        assert!(state.get(ChannelId(1)).unwrap().is_synced(MessageId(1)));
    }

    #[test]
    fn test_access_denied_listing_stops_loop() {
        let f = fixture();
        f.mirror.register_channel(&ChannelRef::parse("@cats")).unwrap();
        f.album.fail_next(AlbumOp::List, ErrorClass::AccessDenied);

        let control = f.mirror.control();
        assert!(control.start().is_some());
        let err = f.mirror.run().unwrap_err();

        assert!(err.is_fatal());
        assert!(!control.is_running());
    }

    #[test]
    fn test_run_without_start_returns() {
        let f = fixture();
        assert!(f.mirror.run().is_ok());
        assert_eq!(f.store.save_count(), 0);
        assert!(f.sleeper.sleeps().is_empty());
    }

    #[test]
    fn test_restart_waits_for_cycle_in_flight() {
        let chat = Arc::new(InMemoryChatSource::new());
        chat.add_channel(ChatInfo::new(1, "Cats").with_handle("cats"));
        let album = Arc::new(InMemoryAlbum::new());
        let settings = MirrorSettings::default();
        let (sleeper, entered, release) = GateSleeper::new(settings.retry.pack_fail_backoff());

        let mirror = Arc::new(
            Mirror::new(chat.clone(), album.clone(), Arc::new(InMemoryStateStore::new()), settings)
                .with_sleeper(sleeper),
        );
        mirror.register_channel(&ChannelRef::parse("@cats")).unwrap();
        chat.post(Message::builder(1, ChannelId(1)).photo().text("a").build());
        chat.post(Message::builder(2, ChannelId(1)).photo().text("b").build());
        for _ in 0..5 {
            album.fail_next(AlbumOp::Upload, ErrorClass::AccessDenied);
        }

        let control = mirror.control();
        let first_session = control.start().unwrap();
        let first = {
            let mirror = Arc::clone(&mirror);
            thread::spawn(move || mirror.run_session(first_session))
        };

        // The first loop is paused before resuming its failed pack
        entered.recv().unwrap();
        assert!(control.stop());
        let second_session = control.start().unwrap();
        let second = {
            let mirror = Arc::clone(&mirror);
            thread::spawn(move || mirror.run_session(second_session))
        };

        release.send(()).unwrap();
        first.join().unwrap().unwrap();
        control.stop();
        second.join().unwrap().unwrap();

        let captions: Vec<String> = album.photos().into_iter().map(|p| p.caption).collect();
        assert_eq!(captions, vec!["a", "b"]);
        let state = mirror.tracked().unwrap();
        assert!(state.get(ChannelId(1)).unwrap().is_synced(MessageId(2)));
    }
}
