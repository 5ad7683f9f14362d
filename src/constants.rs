use chrono::Duration;

/// The duration of a billing session window.
/// Activity is grouped into 5-hour windows separated by gaps.
pub const SESSION_DURATION: Duration = Duration::hours(5);

/// How far behind `now` the session finder scans for the current
/// window's start. The true start may itself be hours old, so this has
/// to comfortably exceed SESSION_DURATION.
pub const SESSION_LOOKBACK: Duration = Duration::hours(24);

/// Slack applied to the file-mtime skip heuristic during ingestion.
/// A file may be appended to long after creation; only files whose
/// mtime predates `since - MTIME_SLACK` are safe to skip unopened.
pub const MTIME_SLACK: Duration = Duration::hours(24);

/// Default bucket width for token rate history.
pub const RATE_INTERVAL: Duration = Duration::minutes(5);

/// The exhaustion predictor averages at most this many of the most
/// recent rate samples.
pub const MAX_RATE_SAMPLES: usize = 10;

/// Pricing rates are quoted per million tokens.
pub const TOKENS_PER_MILLION: f64 = 1_000_000.0;
