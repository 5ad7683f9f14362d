use serde::Serialize;
use std::collections::HashMap;

/// Aggregated cost and token totals for one lower time bound, plus a
/// per-model breakdown. Built fresh on every aggregation pass and handed
/// to the presentation layer; never persisted here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageSummary {
    pub total_cost: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    /// Keyed by the record's raw model string. No aliasing: two spellings
    /// of the same family stay distinct even when priced identically.
    pub by_model: HashMap<String, ModelUsage>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelUsage {
    pub cost: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub requests: u64,
}

impl UsageSummary {
    /// Headline token count: input + output only.
    ///
    /// Cache tokens are tracked and priced but intentionally excluded
    /// here; cache reads are discounted to a tenth of the input rate and
    /// would otherwise dwarf the real usage on screen.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn request_count(&self) -> u64 {
        self.by_model.values().map(|m| m.requests).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_tokens_excludes_cache() {
        let summary = UsageSummary {
            input_tokens: 100,
            output_tokens: 50,
            cache_creation_tokens: 9_000,
            cache_read_tokens: 90_000,
            ..Default::default()
        };
        assert_eq!(summary.total_tokens(), 150);
    }

    #[test]
    fn test_request_count_sums_models() {
        let mut summary = UsageSummary::default();
        summary.by_model.insert(
            "a".to_string(),
            ModelUsage {
                requests: 3,
                ..Default::default()
            },
        );
        summary.by_model.insert(
            "b".to_string(),
            ModelUsage {
                requests: 2,
                ..Default::default()
            },
        );
        assert_eq!(summary.request_count(), 5);
    }
}
