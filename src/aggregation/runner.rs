//! Cursor-driven incremental run protocol.
//!
//! Each run reads the stored cursor for an aggregator kind, aggregates the
//! window `(cursor, window_end]`, and advances the cursor, all in one
//! transaction, so a failed run rolls back both stats and cursor and the
//! next invocation naturally retries the same window. Invocations are
//! serialized per kind: additive merges are not idempotent, so the same
//! window must never be in flight twice.

use crate::aggregation::{
    affiliate_info, cursor, referee_stats, AggregationError, AggregationSummary, Window,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::info;

/// The two independent aggregators, each with its own cursor and output
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregatorKind {
    /// Per-affiliate rollup into `affiliate_info`.
    AffiliateInfo,
    /// Per-referee rollup into `affiliate_referee_stats`.
    RefereeStats,
}

impl AggregatorKind {
    /// All kinds, in the order `run_all` processes them.
    pub fn all() -> [AggregatorKind; 2] {
        [AggregatorKind::AffiliateInfo, AggregatorKind::RefereeStats]
    }

    /// Cursor-row identifier for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregatorKind::AffiliateInfo => "affiliate_info",
            AggregatorKind::RefereeStats => "referee_stats",
        }
    }
}

impl std::fmt::Display for AggregatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one cursor-driven invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum RunOutcome {
    /// The window was aggregated and the cursor advanced.
    #[serde(rename_all = "camelCase")]
    Completed {
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        summary: AggregationSummary,
    },
    /// The requested window end did not extend past the cursor; nothing ran.
    #[serde(rename_all = "camelCase")]
    Skipped { window_start: DateTime<Utc> },
}

/// Drives the aggregators through the cursor protocol.
pub struct AggregationRunner {
    pool: SqlitePool,
    /// Initial window start used when an aggregator has no stored cursor.
    /// Supplied by the operator; the runner never reads the clock itself.
    initial_window_start: DateTime<Utc>,
    affiliate_info_lock: Mutex<()>,
    referee_stats_lock: Mutex<()>,
}

impl AggregationRunner {
    /// Create a runner over the given pool.
    pub fn new(pool: SqlitePool, initial_window_start: DateTime<Utc>) -> Self {
        AggregationRunner {
            pool,
            initial_window_start,
            affiliate_info_lock: Mutex::new(()),
            referee_stats_lock: Mutex::new(()),
        }
    }

    fn lock_for(&self, kind: AggregatorKind) -> &Mutex<()> {
        match kind {
            AggregatorKind::AffiliateInfo => &self.affiliate_info_lock,
            AggregatorKind::RefereeStats => &self.referee_stats_lock,
        }
    }

    /// Run one aggregator over `(stored cursor, window_end]`.
    ///
    /// # Errors
    /// Returns an error if the run fails; the transaction is rolled back and
    /// the cursor stays put, so retrying with the same `window_end` is safe.
    pub async fn run_once(
        &self,
        kind: AggregatorKind,
        window_end: DateTime<Utc>,
    ) -> Result<RunOutcome, AggregationError> {
        let _guard = self.lock_for(kind).lock().await;

        let mut tx = self.pool.begin().await?;

        let window_start = cursor::next_window_start(&mut tx, kind)
            .await?
            .unwrap_or(self.initial_window_start);

        let window = Window::new(window_start, window_end);
        if window.is_empty() {
            return Ok(RunOutcome::Skipped { window_start });
        }

        let summary = match kind {
            AggregatorKind::AffiliateInfo => {
                affiliate_info::aggregate_window(&mut tx, &window).await?
            }
            AggregatorKind::RefereeStats => {
                referee_stats::aggregate_window(&mut tx, &window).await?
            }
        };

        cursor::advance(&mut tx, kind, window_end).await?;
        tx.commit().await?;

        info!(
            aggregator = kind.as_str(),
            window_start = %window_start,
            window_end = %window_end,
            fills = summary.fills_processed,
            rows = summary.rows_merged,
            "Aggregation window committed"
        );

        Ok(RunOutcome::Completed {
            window_start,
            window_end,
            summary,
        })
    }

    /// Run every aggregator up to `window_end`, in order.
    ///
    /// # Errors
    /// Returns the first failure; kinds already completed keep their
    /// advanced cursors (they are independent), the failing kind keeps its
    /// old one.
    pub async fn run_all(
        &self,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<(AggregatorKind, RunOutcome)>, AggregationError> {
        let mut outcomes = Vec::with_capacity(AggregatorKind::all().len());
        for kind in AggregatorKind::all() {
            let outcome = self.run_once(kind, window_end).await?;
            outcomes.push((kind, outcome));
        }
        Ok(outcomes)
    }
}
