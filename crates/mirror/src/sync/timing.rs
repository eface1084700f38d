//! Sleeping and interval formatting
//!
//! All waits of the engine (backoffs, courtesy delays, the pause between
//! cycles) go through [`Sleeper`], so tests can observe multi-hour backoffs
//! without waiting for them.

use std::sync::Mutex;
use std::time::Duration;

/// Blocks the calling thread for a duration
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Records requested sleeps instead of sleeping
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration passed to `sleep`, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    /// How many sleeps of exactly this duration were requested
    pub fn count(&self, duration: Duration) -> usize {
        self.sleeps
            .lock()
            .unwrap()
            .iter()
            .filter(|d| **d == duration)
            .count()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Format a cycle interval for operator replies, e.g. "1 h 30 min"
pub fn format_interval(interval: Duration) -> String {
    let minutes = interval.as_secs() / 60;
    let (hours, minutes) = (minutes / 60, minutes % 60);

    match (hours, minutes) {
        (0, m) => format!("{} min", m),
        (h, 0) => format!("{} h", h),
        (h, m) => format!("{} h {} min", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minutes_only() {
        assert_eq!(format_interval(Duration::from_secs(45 * 60)), "45 min");
        assert_eq!(format_interval(Duration::from_secs(30)), "0 min");
    }

    #[test]
    fn test_format_whole_hours() {
        assert_eq!(format_interval(Duration::from_secs(2 * 3600)), "2 h");
    }

    #[test]
    fn test_format_hours_and_minutes() {
        assert_eq!(format_interval(Duration::from_secs(90 * 60)), "1 h 30 min");
    }

    #[test]
    fn test_recording_sleeper() {
        let sleeper = RecordingSleeper::new();
        sleeper.sleep(Duration::from_secs(3));
        sleeper.sleep(Duration::from_secs(3));
        sleeper.sleep(Duration::from_secs(60));

        assert_eq!(sleeper.count(Duration::from_secs(3)), 2);
        assert_eq!(sleeper.total(), Duration::from_secs(66));
        assert_eq!(sleeper.sleeps().len(), 3);
    }
}
