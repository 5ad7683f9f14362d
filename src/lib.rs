// Module declarations
pub mod aggregate;
pub mod constants;
pub mod error;
pub mod ingest;
pub mod meter;
pub mod paths;
pub mod pricing;
pub mod rate;
pub mod sessions;
pub mod types;

// Re-export commonly used items
pub use aggregate::aggregate;
pub use error::{MeterError, Result};
pub use ingest::{DedupCache, FileCursor, IncrementalScan, ScanOutcome, ScanStats};
pub use meter::{SessionReport, UsageMeter};
pub use paths::default_log_roots;
pub use pricing::{PricingEntry, PricingTable};
pub use rate::RateHistory;
pub use sessions::{GapSessions, HourAlignedSessions, SessionBoundaryStrategy};
pub use types::{
    MessageId, ModelUsage, RecordKind, RequestId, SessionWindow, TokenCounts, UniqueHash,
    UsageRecord, UsageSummary,
};
