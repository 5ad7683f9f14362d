pub mod ids;
pub mod record;
pub mod session;
pub mod summary;

pub use ids::{MessageId, RequestId, UniqueHash};
pub use record::{RawLogLine, RawMessage, RawUsage, RecordKind, TokenCounts, UsageRecord};
pub use session::SessionWindow;
pub use summary::{ModelUsage, UsageSummary};
