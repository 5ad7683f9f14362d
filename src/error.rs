use thiserror::Error;

/// The core itself never fails: missing directories, unreadable files and
/// malformed lines all degrade to empty or partial results (see `ScanStats`).
/// Only the async facade can surface an error, when a blocking scan task
/// cannot be joined.
#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Background scan task failed")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, MeterError>;
