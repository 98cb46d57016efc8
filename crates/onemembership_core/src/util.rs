//! Small shared helpers: clock, random identifiers, rounding and text cleanup.

use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use std::time::{SystemTime, UNIX_EPOCH};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

static EMOJI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\x{1F000}-\x{1FAFF}\x{2600}-\x{27BF}\x{2300}-\x{23FF}\x{2B00}-\x{2BFF}\x{FE00}-\x{FE0F}\x{200D}\x{E0020}-\x{E007F}]",
    )
    .expect("valid emoji regex")
});

/// Returns the current wall-clock time as unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Returns the current wall-clock time as unix epoch seconds.
pub fn now_epoch_secs() -> i64 {
    now_epoch_ms() / 1000
}

/// Adds whole days to an epoch-millisecond timestamp, saturating on overflow.
pub fn add_days(epoch_ms: i64, days: i64) -> i64 {
    epoch_ms.saturating_add(days.saturating_mul(MILLIS_PER_DAY))
}

/// Generates `length` random ASCII alphanumeric characters.
pub fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Rounds a monetary value to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Removes emoji and pictographic symbols, then trims surrounding whitespace.
///
/// Bot buttons carry emoji prefixes; lookups key on the bare label.
pub fn strip_emoji(value: &str) -> String {
    EMOJI_RE.replace_all(value, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::{add_days, random_string, round2, strip_emoji};

    #[test]
    fn random_string_has_requested_length_and_charset() {
        let value = random_string(30);
        assert_eq!(value.len(), 30);
        assert!(value.chars().all(|ch| ch.is_ascii_alphanumeric()));
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(10.456), 10.46);
        assert_eq!(round2(3.0), 3.0);
    }

    #[test]
    fn strip_emoji_removes_pictographs() {
        assert_eq!(strip_emoji("🏠 Home"), "Home");
        assert_eq!(strip_emoji("Settings ⚙️"), "Settings");
        assert_eq!(strip_emoji("plain"), "plain");
    }

    #[test]
    fn add_days_counts_whole_days() {
        assert_eq!(add_days(0, 2), 172_800_000);
    }
}
