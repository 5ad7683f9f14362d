use crate::constants::TOKENS_PER_MILLION;
use crate::types::TokenCounts;
use std::collections::HashMap;

/// Per-model rates, each in USD per 1,000,000 tokens of that class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingEntry {
    pub input: f64,
    pub output: f64,
    pub cache_write: f64,
    pub cache_read: f64,
}

impl PricingEntry {
    pub const fn new(input: f64, output: f64, cache_write: f64, cache_read: f64) -> Self {
        Self {
            input,
            output,
            cache_write,
            cache_read,
        }
    }

    /// Cost in USD for one record's token counts.
    ///
    /// Division by 1e6 happens per class per record in floating point;
    /// truncating small counts here would systematically underbill.
    /// Rounding is left to the presentation layer.
    pub fn cost(&self, tokens: &TokenCounts) -> f64 {
        (tokens.input_tokens as f64 / TOKENS_PER_MILLION) * self.input
            + (tokens.output_tokens as f64 / TOKENS_PER_MILLION) * self.output
            + (tokens.cache_creation_tokens as f64 / TOKENS_PER_MILLION) * self.cache_write
            + (tokens.cache_read_tokens as f64 / TOKENS_PER_MILLION) * self.cache_read
    }
}

const OPUS: PricingEntry = PricingEntry::new(15.0, 75.0, 18.75, 1.5);
const SONNET: PricingEntry = PricingEntry::new(3.0, 15.0, 3.75, 0.3);
const HAIKU_3: PricingEntry = PricingEntry::new(0.25, 1.25, 0.3125, 0.025);
const HAIKU_3_5: PricingEntry = PricingEntry::new(0.8, 4.0, 1.0, 0.08);
const SYNTHETIC: PricingEntry = PricingEntry::new(0.0, 0.0, 0.0, 0.0);

/// Versioned model → rate table with a designated fallback entry.
/// Loaded once at process start and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PricingTable {
    rates: HashMap<String, PricingEntry>,
    default: PricingEntry,
}

impl PricingTable {
    /// The built-in rate table. Unrecognized models fall back to
    /// sonnet-class rates rather than pricing at zero.
    pub fn builtin() -> Self {
        let rates = [
            ("claude-3-opus-20240229", OPUS),
            ("claude-opus-4-20250514", OPUS),
            ("claude-opus-4-1-20250805", OPUS),
            ("claude-3-sonnet", SONNET),
            ("claude-3.5-sonnet", SONNET),
            ("claude-3-5-sonnet-20241022", SONNET),
            ("claude-sonnet-4-20250514", SONNET),
            ("claude-3-haiku", HAIKU_3),
            ("claude-3.5-haiku", HAIKU_3_5),
            ("<synthetic>", SYNTHETIC),
        ]
        .into_iter()
        .map(|(model, entry)| (model.to_string(), entry))
        .collect();

        Self {
            rates,
            default: SONNET,
        }
    }

    /// Build a custom table, e.g. from rates fetched by an outer layer.
    pub fn from_rates(rates: HashMap<String, PricingEntry>, default: PricingEntry) -> Self {
        Self { rates, default }
    }

    /// Rate lookup by exact model string; unknown models get the default
    /// entry, silently. An unrecognized model is not an error.
    pub fn rate_for(&self, model: &str) -> &PricingEntry {
        self.rates.get(model).unwrap_or(&self.default)
    }

    pub fn default_entry(&self) -> &PricingEntry {
        &self.default
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_cost_all_classes() {
        let tokens = TokenCounts {
            input_tokens: 1000,
            output_tokens: 500,
            cache_creation_tokens: 200,
            cache_read_tokens: 300,
        };
        let cost = OPUS.cost(&tokens);
        // (1000 * 15 + 500 * 75 + 200 * 18.75 + 300 * 1.5) / 1e6
        assert!((cost - 0.0567).abs() < 1e-12);
    }

    #[test]
    fn test_small_counts_do_not_truncate_to_zero() {
        let tokens = TokenCounts {
            input_tokens: 1,
            ..Default::default()
        };
        assert!(SONNET.cost(&tokens) > 0.0);
    }

    #[test]
    fn test_unknown_model_falls_back_to_default() {
        let table = PricingTable::builtin();
        let entry = table.rate_for("totally-unknown-model");
        assert_eq!(entry, table.default_entry());
        assert_eq!(entry.input, 3.0);
    }

    #[test]
    fn test_synthetic_model_is_free() {
        let table = PricingTable::builtin();
        let tokens = TokenCounts {
            input_tokens: 1_000_000,
            output_tokens: 1_000_000,
            ..Default::default()
        };
        assert_eq!(table.rate_for("<synthetic>").cost(&tokens), 0.0);
    }

    #[test]
    fn test_sonnet_reference_rates() {
        let table = PricingTable::builtin();
        let entry = table.rate_for("claude-3-5-sonnet-20241022");
        assert_eq!(entry.input, 3.0);
        assert_eq!(entry.output, 15.0);
        assert_eq!(entry.cache_write, 3.75);
        assert_eq!(entry.cache_read, 0.3);
    }
}
