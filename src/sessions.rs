use crate::types::SessionWindow;
use chrono::{DateTime, Timelike, Utc};

/// Pluggable session-boundary heuristic.
///
/// The transcript logs carry no explicit billing-session ids, so windows
/// have to be reconstructed from raw timestamps. Two heuristics exist in
/// the wild; both live behind this trait so callers pick one instead of
/// duplicating the walk.
#[cfg_attr(test, mockall::automock)]
pub trait SessionBoundaryStrategy {
    /// Partition timestamps (in any order) into non-overlapping 5-hour
    /// windows with strictly increasing starts.
    fn partition(&self, timestamps: &[DateTime<Utc>]) -> Vec<SessionWindow>;

    /// The window containing `now`, if any. Zero timestamps or an expired
    /// last window both mean no current session; a fresh one begins with
    /// the next incoming record, never retroactively.
    fn find_session_start(
        &self,
        now: DateTime<Utc>,
        timestamps: &[DateTime<Utc>],
    ) -> Option<SessionWindow> {
        self.partition(timestamps)
            .into_iter()
            .rev()
            .find(|window| window.contains(now))
    }
}

/// Gap-based reconstruction, the default heuristic.
///
/// The first timestamp opens a session; each subsequent timestamp opens a
/// new one iff it falls after the current window's end, i.e. more than
/// 5 hours after that window's start. A timestamp landing exactly on the
/// boundary stays inside.
#[derive(Debug, Clone, Copy, Default)]
pub struct GapSessions;

impl SessionBoundaryStrategy for GapSessions {
    fn partition(&self, timestamps: &[DateTime<Utc>]) -> Vec<SessionWindow> {
        let mut sorted = timestamps.to_vec();
        sorted.sort_unstable();

        let mut windows: Vec<SessionWindow> = Vec::new();
        for timestamp in sorted {
            match windows.last() {
                Some(window) if !window.expired_by(timestamp) => {}
                _ => windows.push(SessionWindow::starting_at(timestamp)),
            }
        }
        windows
    }
}

/// Legacy hour-aligned reconstruction: a timestamp joins the first
/// existing window that contains it; otherwise its floored hour opens a
/// new window.
///
/// Kept as an alternative strategy; never verified against the provider's
/// actual reset behavior. Prefer `GapSessions`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HourAlignedSessions;

impl SessionBoundaryStrategy for HourAlignedSessions {
    fn partition(&self, timestamps: &[DateTime<Utc>]) -> Vec<SessionWindow> {
        let mut sorted = timestamps.to_vec();
        sorted.sort_unstable();

        let mut windows: Vec<SessionWindow> = Vec::new();
        for timestamp in sorted {
            // Membership uses the same inclusive end bound the windows
            // themselves report, so a timestamp landing exactly on a
            // window's end stays in that window instead of opening the
            // next one.
            let fits_existing = windows.iter().any(|window| window.contains(timestamp));
            if !fits_existing {
                windows.push(SessionWindow::starting_at(floor_to_hour(timestamp)));
            }
        }
        windows
    }
}

/// Floor a timestamp to the hour (14:37:22 -> 14:00:00).
fn floor_to_hour(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}
