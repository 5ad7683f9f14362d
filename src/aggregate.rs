use crate::pricing::PricingTable;
use crate::types::{ModelUsage, UsageRecord, UsageSummary};

/// Sum cost and token counts over `records`, pricing each record against
/// `pricing`.
///
/// Time filtering and deduplication are ingestion's job; every record
/// handed in here is counted. Breakdown keys are the raw model strings,
/// deliberately unaliased. Costs stay unrounded floats end to end.
pub fn aggregate(records: &[UsageRecord], pricing: &PricingTable) -> UsageSummary {
    let mut summary = UsageSummary::default();

    for record in records {
        let cost = pricing.rate_for(&record.model).cost(&record.tokens);
        let tokens = &record.tokens;

        summary.total_cost += cost;
        summary.input_tokens += tokens.input_tokens;
        summary.output_tokens += tokens.output_tokens;
        summary.cache_creation_tokens += tokens.cache_creation_tokens;
        summary.cache_read_tokens += tokens.cache_read_tokens;

        let model = summary.by_model.entry(record.model.clone()).or_insert_with(ModelUsage::default);
        model.cost += cost;
        model.input_tokens += tokens.input_tokens;
        model.output_tokens += tokens.output_tokens;
        model.cache_creation_tokens += tokens.cache_creation_tokens;
        model.cache_read_tokens += tokens.cache_read_tokens;
        model.requests += 1;
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenCounts;
    use chrono::{TimeZone, Utc};

    fn record(model: &str, tokens: TokenCounts) -> UsageRecord {
        UsageRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            model: model.to_string(),
            tokens,
            identity: None,
        }
    }

    #[test]
    fn test_sonnet_reference_cost() {
        // 1M input + 1M output at sonnet rates must come out to exactly
        // 3.0 + 15.0.
        let records = vec![record(
            "claude-3-5-sonnet-20241022",
            TokenCounts {
                input_tokens: 1_000_000,
                output_tokens: 1_000_000,
                ..Default::default()
            },
        )];
        let summary = aggregate(&records, &PricingTable::builtin());
        assert!((summary.total_cost - 18.0).abs() < 1e-9);
        assert_eq!(summary.total_tokens(), 2_000_000);
    }

    #[test]
    fn test_unknown_model_priced_at_default() {
        let records = vec![record(
            "totally-unknown-model",
            TokenCounts {
                input_tokens: 1_000_000,
                ..Default::default()
            },
        )];
        let summary = aggregate(&records, &PricingTable::builtin());
        assert!((summary.total_cost - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_cache_read_only_record_costs_but_adds_no_headline_tokens() {
        let records = vec![record(
            "claude-sonnet-4-20250514",
            TokenCounts {
                cache_read_tokens: 5000,
                ..Default::default()
            },
        )];
        let summary = aggregate(&records, &PricingTable::builtin());
        assert_eq!(summary.total_tokens(), 0);
        assert!(summary.total_cost > 0.0);
        assert_eq!(summary.cache_read_tokens, 5000);
    }

    #[test]
    fn test_breakdown_keys_are_raw_model_strings() {
        let tokens = TokenCounts {
            input_tokens: 10,
            ..Default::default()
        };
        let records = vec![
            record("claude-3-5-sonnet-20241022", tokens),
            record("claude-sonnet-4-20250514", tokens),
            record("claude-sonnet-4-20250514", tokens),
        ];
        let summary = aggregate(&records, &PricingTable::builtin());
        assert_eq!(summary.by_model.len(), 2);
        assert_eq!(summary.by_model["claude-sonnet-4-20250514"].requests, 2);
        assert_eq!(summary.by_model["claude-3-5-sonnet-20241022"].requests, 1);
        assert_eq!(summary.request_count(), 3);
    }

    #[test]
    fn test_empty_records_zero_summary() {
        let summary = aggregate(&[], &PricingTable::builtin());
        assert_eq!(summary.total_cost, 0.0);
        assert_eq!(summary.total_tokens(), 0);
        assert!(summary.by_model.is_empty());
    }
}
