use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::RetentionError;

static INTERVAL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^(\d+)([mhd])$").ok());

/// Parses `<integer><m|h|d>` (minutes, hours, days).
///
/// Returns `None` for any other form, including other units and values that
/// overflow a [`Duration`].
///
/// ```
/// use std::time::Duration;
/// use flowtrail::retention::parse_interval;
///
/// assert_eq!(parse_interval("2h"), Some(Duration::from_secs(7200)));
/// assert_eq!(parse_interval("90s"), None);
/// ```
pub fn parse_interval(input: &str) -> Option<Duration> {
    let caps = INTERVAL.as_ref()?.captures(input)?;
    let n: u64 = caps[1].parse().ok()?;
    let unit = match &caps[2] {
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return None,
    };
    n.checked_mul(unit).map(Duration::from_secs)
}

/// Which telemetry rows a sweep removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeMode {
    /// Every row, whatever its age.
    #[default]
    FullWipe,
    /// Rows whose `timestamp` is older than one interval.
    OlderThanInterval,
}

/// A validated sweep cadence plus purge mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub interval: Duration,
    pub mode: PurgeMode,
}

impl RetentionPolicy {
    /// Validates `interval`. Zero-length intervals are rejected.
    pub fn parse(interval: &str, mode: PurgeMode) -> Result<Self, RetentionError> {
        match parse_interval(interval) {
            Some(d) if !d.is_zero() => Ok(Self { interval: d, mode }),
            _ => Err(RetentionError::InvalidInterval {
                input: interval.to_string(),
            }),
        }
    }
}
