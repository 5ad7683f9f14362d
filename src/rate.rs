use crate::constants::MAX_RATE_SAMPLES;
use crate::types::{SessionWindow, UsageRecord};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Sparse consumption-rate series for one session: headline token deltas
/// between consecutive records, accumulated into fixed-width intervals,
/// idle intervals omitted.
///
/// Recomputed fresh on every call; nothing here is cached across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateHistory {
    interval: Duration,
    samples: Vec<u64>,
}

impl RateHistory {
    /// Bucket the deltas between consecutive session records into fixed
    /// intervals from `session_start`.
    ///
    /// Each record's contribution is the change in its headline count
    /// relative to the previous record, not the count itself; the first
    /// record only anchors the walk. Deltas accumulate signed per bucket
    /// and only buckets with positive net tokens survive, so long idle
    /// gaps collapse instead of emitting zero-runs. Records outside the
    /// session window are ignored.
    pub fn from_records(
        session_start: DateTime<Utc>,
        records: &[UsageRecord],
        interval: Duration,
    ) -> Self {
        let interval_seconds = interval.num_seconds();
        if interval_seconds <= 0 {
            return Self {
                interval,
                samples: Vec::new(),
            };
        }

        let window = SessionWindow::starting_at(session_start);
        let mut timed: Vec<(DateTime<Utc>, u64)> = records
            .iter()
            .filter(|record| window.contains(record.timestamp))
            .map(|record| (record.timestamp, record.tokens.headline()))
            .collect();
        timed.sort_unstable_by_key(|(timestamp, _)| *timestamp);

        let mut buckets: BTreeMap<i64, i64> = BTreeMap::new();
        for pair in timed.windows(2) {
            let (_, previous) = pair[0];
            let (timestamp, current) = pair[1];
            let delta = current as i64 - previous as i64;
            let index = (timestamp - session_start).num_seconds() / interval_seconds;
            *buckets.entry(index).or_insert(0) += delta;
        }

        Self {
            interval,
            samples: buckets
                .into_values()
                .filter(|net| *net > 0)
                .map(|net| net as u64)
                .collect(),
        }
    }

    pub fn samples(&self) -> &[u64] {
        &self.samples
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Average tokens-per-interval over the most recent samples.
    /// `None` until at least one sample exists.
    pub fn recent_rate(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let recent = &self.samples[self.samples.len().saturating_sub(MAX_RATE_SAMPLES)..];
        let rate = recent.iter().sum::<u64>() as f64 / recent.len() as f64;
        (rate > 0.0).then_some(rate)
    }

    /// Linearly extrapolate the instant the token quota runs out.
    ///
    /// `None` means "no prediction yet": no samples, a zero rate, or a
    /// session with no remaining time. Those are valid terminal states for
    /// the caller ("calculating", "stable"), not failures. The predicted
    /// instant may fall before or after the session's natural end; both
    /// are reportable outcomes and the distinction is the caller's to
    /// present.
    pub fn predict_exhaustion(
        &self,
        tokens_used: u64,
        token_limit: u64,
        now: DateTime<Utc>,
        session_end: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if now >= session_end {
            return None;
        }
        let rate = self.recent_rate()?;

        let remaining = token_limit.saturating_sub(tokens_used) as f64;
        let intervals_left = remaining / rate;
        let seconds = intervals_left * self.interval.num_seconds() as f64;
        Some(now + Duration::try_seconds(seconds as i64)?)
    }
}
