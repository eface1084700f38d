//! Classified retries for remote calls
//!
//! Album management calls (list, create, delete) and chat reads are retried
//! here, bounded by `api_call_max_tries`. Photo uploads keep their own
//! per-photo counter in the upload pipeline.

use log::{error, info, warn};
use std::time::Duration;

use super::timing::Sleeper;
use crate::album::{AlbumError, ErrorClass};
use crate::chat::ChatError;
use crate::config::RetrySettings;

/// Attempt counter for one retried operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    last_class: Option<ErrorClass>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed attempt
    pub fn record(&mut self, class: ErrorClass) {
        self.attempts += 1;
        self.last_class = Some(class);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_class(&self) -> Option<ErrorClass> {
        self.last_class
    }

    pub fn is_exhausted(&self, max_tries: u32) -> bool {
        self.attempts >= max_tries
    }
}

/// Retries remote calls with the backoff table of [`RetrySettings`]
pub struct RetryPolicy<'a> {
    settings: &'a RetrySettings,
    sleeper: &'a dyn Sleeper,
}

impl<'a> RetryPolicy<'a> {
    pub fn new(settings: &'a RetrySettings, sleeper: &'a dyn Sleeper) -> Self {
        Self { settings, sleeper }
    }

    /// Run an album management call
    ///
    /// Rate limits sleep the anti-flood backoff and re-issue the identical
    /// call. Access-denied and expired-credential answers are returned
    /// immediately: on management calls they need operator action.
    pub fn album_call<T>(
        &self,
        method: &str,
        mut call: impl FnMut() -> Result<T, AlbumError>,
    ) -> Result<T, AlbumError> {
        let mut state = RetryState::new();

        loop {
            let error = match call() {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let class = error.class();
            match class {
                ErrorClass::AccessDenied => {
                    error!("{}", error);
                    return Err(error);
                }
                ErrorClass::CredentialsExpired => {
                    error!("{}. Update album-credentials.json and restart", error);
                    return Err(error);
                }
                _ => {}
            }

            state.record(class);
            if state.is_exhausted(self.settings.api_call_max_tries) {
                warn!(
                    "Giving up on {} after {} attempts: {}",
                    method,
                    state.attempts(),
                    error
                );
                return Err(error);
            }

            let backoff = self
                .settings
                .backoff_for(class)
                .unwrap_or_else(|| Duration::from_secs(self.settings.retry_seconds));
            warn!(
                "{} failed ({}): {}. Retrying in {}s",
                method,
                class,
                error,
                backoff.as_secs()
            );
            self.sleeper.sleep(backoff);
        }
    }

    /// Run a chat read
    ///
    /// Flood waits sleep exactly as long as the server asked. Unknown
    /// channels are not retried.
    pub fn chat_call<T>(
        &self,
        what: &str,
        mut call: impl FnMut() -> Result<T, ChatError>,
    ) -> Result<T, ChatError> {
        let mut attempts = 0;

        loop {
            let error = match call() {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let backoff = match &error {
                ChatError::NotFound(_) => return Err(error),
                ChatError::FloodWait(wait) => *wait,
                ChatError::Other(_) => Duration::from_secs(self.settings.retry_seconds),
            };

            attempts += 1;
            if attempts >= self.settings.api_call_max_tries {
                warn!("Giving up on {} after {} attempts: {}", what, attempts, error);
                return Err(error);
            }

            info!("{} failed: {}. Retrying in {}s", what, error, backoff.as_secs());
            self.sleeper.sleep(backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::timing::RecordingSleeper;
    use anyhow::anyhow;

    #[test]
    fn test_rate_limit_sleeps_anti_flood_then_succeeds() {
        let settings = RetrySettings::default();
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(&settings, &sleeper);

        let mut calls = 0;
        let result = policy.album_call("photos.getAlbums", || {
            calls += 1;
            if calls == 1 {
                Err(AlbumError::RateLimited("photos.getAlbums".into()))
            } else {
                Ok(7)
            }
        });

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 2);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(43200)]);
    }

    #[test]
    fn test_access_denied_is_not_retried() {
        let settings = RetrySettings::default();
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(&settings, &sleeper);

        let mut calls = 0;
        let result: Result<(), _> = policy.album_call("photos.createAlbum", || {
            calls += 1;
            Err(AlbumError::AccessDenied("photos.createAlbum".into()))
        });

        assert_eq!(result.unwrap_err().class(), ErrorClass::AccessDenied);
        assert_eq!(calls, 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn test_management_calls_are_bounded() {
        let settings = RetrySettings::default();
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(&settings, &sleeper);

        let mut calls = 0;
        let result: Result<(), _> = policy.album_call("photos.getAlbums", || {
            calls += 1;
            Err(AlbumError::from_api("photos.getAlbums", 10, "Internal error"))
        });

        assert!(result.is_err());
        assert_eq!(calls, 5);
        assert_eq!(sleeper.count(Duration::from_secs(30)), 4);
    }

    #[test]
    fn test_flood_wait_sleeps_requested_duration() {
        let settings = RetrySettings::default();
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(&settings, &sleeper);

        let mut calls = 0;
        let result = policy.chat_call("history", || {
            calls += 1;
            match calls {
                1 => Err(ChatError::FloodWait(Duration::from_secs(17))),
                2 => Err(ChatError::Other(anyhow!("connection reset"))),
                _ => Ok("page"),
            }
        });

        assert_eq!(result.unwrap(), "page");
        assert_eq!(
            sleeper.sleeps(),
            vec![Duration::from_secs(17), Duration::from_secs(30)]
        );
    }

    #[test]
    fn test_unknown_channel_is_not_retried() {
        let settings = RetrySettings::default();
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(&settings, &sleeper);

        let result: Result<(), _> =
            policy.chat_call("resolve", || Err(ChatError::NotFound("@nope".into())));

        assert!(matches!(result, Err(ChatError::NotFound(_))));
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn test_retry_state() {
        let mut state = RetryState::new();
        assert!(!state.is_exhausted(2));
        state.record(ErrorClass::InvalidTicket);
        state.record(ErrorClass::RateLimited);
        assert!(state.is_exhausted(2));
        assert_eq!(state.last_class(), Some(ErrorClass::RateLimited));
    }
}
