//! Incremental affiliate statistics aggregation.
//!
//! Two aggregators roll eligible referred fills up into running-total
//! tables: [`affiliate_info`] per affiliate, [`referee_stats`] per referred
//! user. Both consume the shared [`eligibility`] filter and merge their
//! deltas additively, so each half-open window `(start, end]` must be
//! processed exactly once. The [`runner`] enforces that with a persisted
//! per-aggregator cursor advanced in the same transaction as the merge.

pub mod affiliate_info;
pub mod cursor;
pub mod eligibility;
pub mod referee_stats;
pub mod runner;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use runner::{AggregationRunner, AggregatorKind, RunOutcome};

use crate::db::UpsertError;

/// A half-open aggregation window `(start, end]` over fill creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Exclusive lower bound.
    pub start: DateTime<Utc>,
    /// Inclusive upper bound.
    pub end: DateTime<Utc>,
}

impl Window {
    /// Create a window.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Window { start, end }
    }

    /// True if the window covers no time (aggregating it is a no-op).
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// What a single aggregation pass touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationSummary {
    /// Eligible fills found in the window.
    pub fills_processed: usize,
    /// Output rows merged.
    pub rows_merged: usize,
}

impl AggregationSummary {
    /// Summary of a pass that touched nothing.
    pub fn empty() -> Self {
        AggregationSummary {
            fills_processed: 0,
            rows_merged: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Merge(#[from] UpsertError),
    #[error("stored value in fills.{column} is corrupt")]
    CorruptValue { column: &'static str },
    #[error("cursor value for {aggregator} is not a valid RFC 3339 timestamp: {value}")]
    CorruptCursor {
        aggregator: &'static str,
        value: String,
    },
}
