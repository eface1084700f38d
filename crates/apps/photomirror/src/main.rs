//! photomirror - mirror channel photos into albums
//!
//! Reads operator commands (`.add @channel`, `.start`, ...) from stdin and
//! prints the replies. Channels are read from a channel export; photos go to
//! the album store unless `--dry-run` keeps them in memory.
//!
//! Usage: `photomirror [--dry-run] [EXPORT]`, where EXPORT defaults to
//! `chat-export.json` in the config directory.

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use mirror::{
    AlbumApi, AlbumCredentials, CommandShell, HttpAlbumClient, InMemoryAlbum, JsonStateStore,
    LogNotifier, Mirror, MirrorSettings, Texts,
};

mod export;

const EXPORT_FILE: &str = "chat-export.json";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    config::init()?;

    let mut dry_run = false;
    let mut export_path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            path => export_path = Some(PathBuf::from(path)),
        }
    }
    let export_path = match export_path {
        Some(path) => path,
        None => config::config_path(EXPORT_FILE).context("Could not determine config directory")?,
    };

    let settings = MirrorSettings::load()?;
    let texts = Texts::load()?;
    let chat = Arc::new(export::load(&export_path)?);
    let album = connect_album(dry_run)?;
    let store = Arc::new(JsonStateStore::open_default()?);
    info!("Channel state is kept in {}", store.path().display());

    let mirror = Mirror::new(chat, album, store, settings);
    let shell = CommandShell::new(Arc::new(mirror), texts, Arc::new(LogNotifier));

    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read operator input")?;
        if let Some(reply) = shell.dispatch(&line) {
            println!("{}", reply);
        }
    }

    // stdin closed: let a running loop finish its cycle
    shell.dispatch(".stop");
    shell.join();
    Ok(())
}

fn connect_album(dry_run: bool) -> Result<Arc<dyn AlbumApi>> {
    if dry_run {
        warn!("Dry run: photos are kept in memory");
        return Ok(Arc::new(InMemoryAlbum::new()));
    }

    let credentials = AlbumCredentials::load()?;
    let client = HttpAlbumClient::connect(credentials.token)?;
    Ok(Arc::new(client))
}
