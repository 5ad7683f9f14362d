use crate::aggregate::aggregate;
use crate::constants::{RATE_INTERVAL, SESSION_LOOKBACK};
use crate::error::Result;
use crate::ingest::{scan_usage_records, DedupCache, ScanOutcome, ScanStats};
use crate::pricing::PricingTable;
use crate::rate::RateHistory;
use crate::sessions::{GapSessions, SessionBoundaryStrategy};
use crate::types::{SessionWindow, UsageSummary};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::task;
use tracing::debug;

/// Everything the presentation layer needs about the current session:
/// the reconstructed window (if any), windowed totals, the consumption
/// trend and the projected quota exhaustion.
#[derive(Debug)]
pub struct SessionReport {
    /// `None` means no current session; the next incoming record opens one.
    pub window: Option<SessionWindow>,
    /// Totals over the window's records; zeroed when there is no window.
    pub summary: UsageSummary,
    pub rate: RateHistory,
    pub predicted_exhaustion: Option<DateTime<Utc>>,
    pub token_limit: u64,
    /// Scan diagnostics, so "zero usage" and "could not read the logs"
    /// stay distinguishable upstream.
    pub stats: ScanStats,
}

/// Synchronous core behind an async face: scans are offloaded to blocking
/// tasks, everything downstream of ingestion is pure computation on the
/// records a scan observed. Stateless across calls apart from the on-disk
/// logs themselves.
pub struct UsageMeter {
    roots: Vec<PathBuf>,
    pricing: PricingTable,
    strategy: Box<dyn SessionBoundaryStrategy + Send + Sync>,
}

impl UsageMeter {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            pricing: PricingTable::builtin(),
            strategy: Box::new(GapSessions),
        }
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn SessionBoundaryStrategy + Send + Sync>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Aggregate usage at or after `since` across all roots
    /// (all history when `None`).
    pub async fn usage_since(&self, since: Option<DateTime<Utc>>) -> Result<UsageSummary> {
        let outcome = self.scan(since).await?;
        Ok(aggregate(&outcome.records, &self.pricing))
    }

    /// Build the full current-session report for the caller-supplied
    /// instant and session token quota.
    pub async fn session_report(&self, now: DateTime<Utc>, token_limit: u64) -> Result<SessionReport> {
        // Generous lookback: the current window's start may itself be
        // hours old, and the previous window must be visible for the gap
        // walk to place the boundary correctly.
        let outcome = self.scan(Some(now - SESSION_LOOKBACK)).await?;

        let timestamps: Vec<DateTime<Utc>> = outcome
            .records
            .iter()
            .map(|record| record.timestamp)
            .filter(|timestamp| *timestamp <= now)
            .collect();

        let Some(window) = self.strategy.find_session_start(now, &timestamps) else {
            debug!("no current session");
            return Ok(SessionReport {
                window: None,
                summary: UsageSummary::default(),
                rate: RateHistory::from_records(now, &[], RATE_INTERVAL),
                predicted_exhaustion: None,
                token_limit,
                stats: outcome.stats,
            });
        };

        let session_records: Vec<_> = outcome
            .records
            .into_iter()
            .filter(|record| record.timestamp <= now && window.contains(record.timestamp))
            .collect();

        let summary = aggregate(&session_records, &self.pricing);
        let rate = RateHistory::from_records(window.start, &session_records, RATE_INTERVAL);
        let predicted_exhaustion =
            rate.predict_exhaustion(summary.total_tokens(), token_limit, now, window.end());

        Ok(SessionReport {
            window: Some(window),
            summary,
            rate,
            predicted_exhaustion,
            token_limit,
            stats: outcome.stats,
        })
    }

    async fn scan(&self, since: Option<DateTime<Utc>>) -> Result<ScanOutcome> {
        let roots = self.roots.clone();
        let outcome = task::spawn_blocking(move || {
            let mut cache = DedupCache::new();
            let mut merged = ScanOutcome::default();
            for root in &roots {
                let outcome = scan_usage_records(root, since, &mut cache);
                merged.records.extend(outcome.records);
                merged.stats.absorb(outcome.stats);
            }
            merged
        })
        .await?;
        Ok(outcome)
    }
}
