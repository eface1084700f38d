//! Settings and credentials for the mirror engine
//!
//! Settings are read from `settings.json` in the photomirror config
//! directory; every field falls back to a default. Album credentials are
//! loaded from (in order of priority):
//! 1. Compile-time embedded token (for packaged builds)
//! 2. `album-credentials.json` in the config directory
//! 3. Runtime environment variable `ALBUM_API_TOKEN`

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::album::ErrorClass;

/// Settings filename in the config directory
const SETTINGS_FILE: &str = "settings.json";

/// Credentials filename in the config directory
const CREDENTIALS_FILE: &str = "album-credentials.json";

/// Backoff table and retry ceilings for album calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Backoff for unclassified errors
    pub retry_seconds: u64,
    /// Backoff after an undecodable response
    pub json_decode_retry_seconds: u64,
    /// Backoff after a rejected upload ticket
    pub upload_fail_retry_seconds: u64,
    /// Pause before re-sending the unconsumed rest of a pack
    pub pack_fail_retry_seconds: u64,
    /// Backoff after a per-photo access-denied answer
    pub access_denied_retry_seconds: u64,
    /// Backoff after flood control kicks in
    pub anti_flood_retry_seconds: u64,
    /// Attempts per photo before it is given up
    pub photo_upload_max_tries: u32,
    /// Retries of a pack remainder before the rest is dropped
    pub pack_upload_max_tries: u32,
    /// Attempts for management calls (album list/create/delete, chat reads)
    pub api_call_max_tries: u32,
    /// Courtesy delay between two uploads of a pack
    pub upload_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retry_seconds: 30,
            json_decode_retry_seconds: 3,
            upload_fail_retry_seconds: 3,
            pack_fail_retry_seconds: 60,
            access_denied_retry_seconds: 6,
            anti_flood_retry_seconds: 12 * 3600,
            photo_upload_max_tries: 5,
            pack_upload_max_tries: 3,
            api_call_max_tries: 5,
            upload_delay_ms: 1500,
        }
    }
}

impl RetrySettings {
    /// Backoff for an error class; `None` means the error is not retried
    pub fn backoff_for(&self, class: ErrorClass) -> Option<Duration> {
        let seconds = match class {
            ErrorClass::MalformedResponse => self.json_decode_retry_seconds,
            ErrorClass::InvalidTicket => self.upload_fail_retry_seconds,
            ErrorClass::AccessDenied => self.access_denied_retry_seconds,
            ErrorClass::RateLimited => self.anti_flood_retry_seconds,
            ErrorClass::Other => self.retry_seconds,
            ErrorClass::CredentialsExpired => return None,
        };
        Some(Duration::from_secs(seconds))
    }

    pub fn pack_fail_backoff(&self) -> Duration {
        Duration::from_secs(self.pack_fail_retry_seconds)
    }

    pub fn upload_delay(&self) -> Duration {
        Duration::from_millis(self.upload_delay_ms)
    }

    /// Settings with every wait set to zero, for tests and dry runs
    pub fn immediate() -> Self {
        Self {
            retry_seconds: 0,
            json_decode_retry_seconds: 0,
            upload_fail_retry_seconds: 0,
            pack_fail_retry_seconds: 0,
            access_denied_retry_seconds: 0,
            anti_flood_retry_seconds: 0,
            upload_delay_ms: 0,
            ..Self::default()
        }
    }
}

/// Time windows used when a caption is looked up on a neighbor message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionSettings {
    /// Accept the earlier neighbor when posted within this many seconds
    pub epsilon_seconds: i64,
    /// Wider window when the earlier neighbor is a video
    pub video_epsilon_seconds: i64,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            epsilon_seconds: 2,
            video_epsilon_seconds: 30,
        }
    }
}

impl CaptionSettings {
    pub fn epsilon(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.epsilon_seconds)
    }

    pub fn video_epsilon(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.video_epsilon_seconds)
    }
}

/// Top-level engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorSettings {
    /// Pause between two cycles
    pub interval_minutes: u64,
    /// Messages fetched for a channel that has never been synced
    pub fresh_window: usize,
    /// Pause between channels of a multi-channel `.add`
    pub add_delay_ms: u64,
    pub retry: RetrySettings,
    pub caption: CaptionSettings,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            fresh_window: 20,
            add_delay_ms: 1250,
            retry: RetrySettings::default(),
            caption: CaptionSettings::default(),
        }
    }
}

impl MirrorSettings {
    /// Load `settings.json` from the config directory, or defaults
    pub fn load() -> Result<Self> {
        if config::config_exists(SETTINGS_FILE) {
            let settings: Self = config::load_json(SETTINGS_FILE)?;
            info!("Loaded settings from {}", SETTINGS_FILE);
            return Ok(settings);
        }
        Ok(Self::default())
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse settings JSON")
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

/// Access token for the album store
#[derive(Debug, Clone)]
pub struct AlbumCredentials {
    pub token: String,
}

#[derive(Deserialize)]
struct CredentialFile {
    token: String,
}

impl AlbumCredentials {
    /// Load credentials using compile-time, file, then environment sources
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let file: CredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_token(file.token);
        }

        Self::from_env()
    }

    /// Token embedded at build time via `ALBUM_API_TOKEN`
    pub fn from_compile_time() -> Option<Self> {
        let token = option_env!("ALBUM_API_TOKEN")?;
        if token.is_empty() {
            return None;
        }
        Some(Self {
            token: token.to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: CredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_token(file.token)
    }

    pub fn from_env() -> Result<Self> {
        let token = std::env::var("ALBUM_API_TOKEN")
            .context("ALBUM_API_TOKEN environment variable not set")?;
        Self::from_token(token)
    }

    fn from_token(token: String) -> Result<Self> {
        anyhow::ensure!(!token.trim().is_empty(), "Album token is empty");
        Ok(Self { token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings = MirrorSettings::from_json(
            r#"{"interval_minutes": 15, "retry": {"photo_upload_max_tries": 2}}"#,
        )
        .unwrap();

        assert_eq!(settings.interval(), Duration::from_secs(900));
        assert_eq!(settings.retry.photo_upload_max_tries, 2);
        assert_eq!(settings.retry.pack_upload_max_tries, 3);
        assert_eq!(settings.fresh_window, 20);
        assert_eq!(settings.caption, CaptionSettings::default());
    }

    #[test]
    fn test_huge_interval_saturates() {
        let settings = MirrorSettings {
            interval_minutes: u64::MAX,
            ..MirrorSettings::default()
        };
        assert_eq!(settings.interval(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_backoff_table() {
        let retry = RetrySettings::default();
        assert_eq!(
            retry.backoff_for(ErrorClass::RateLimited),
            Some(Duration::from_secs(43200))
        );
        assert_eq!(
            retry.backoff_for(ErrorClass::MalformedResponse),
            Some(Duration::from_secs(3))
        );
        assert_eq!(retry.backoff_for(ErrorClass::Other), Some(Duration::from_secs(30)));
        assert_eq!(retry.backoff_for(ErrorClass::CredentialsExpired), None);
    }

    #[test]
    fn test_parse_credentials() {
        let creds = AlbumCredentials::from_json(r#"{"token": "abc"}"#).unwrap();
        assert_eq!(creds.token, "abc");
        assert!(AlbumCredentials::from_json(r#"{"token": "  "}"#).is_err());
        assert!(AlbumCredentials::from_json(r#"{}"#).is_err());
    }
}
