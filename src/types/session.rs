use crate::constants::SESSION_DURATION;
use chrono::{DateTime, Utc};

/// A derived 5-hour billing window. Only the start is stored; the end is
/// always `start + 5h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub start: DateTime<Utc>,
}

impl SessionWindow {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { start }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + SESSION_DURATION
    }

    /// Inclusive on both bounds: a record landing exactly on the 5-hour
    /// boundary still belongs to the window.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end()
    }

    /// Whether a later timestamp falls beyond this window, i.e. would
    /// open a new session.
    pub fn expired_by(&self, instant: DateTime<Utc>) -> bool {
        instant > self.end()
    }
}
