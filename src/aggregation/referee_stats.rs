//! Per-referee rollup: merges windowed fill deltas into
//! `affiliate_referee_stats`, one row per referred user.

use crate::aggregation::eligibility::{self, AttributedFill};
use crate::aggregation::{AggregationError, AggregationSummary, Window};
use crate::db::repo::stats::{referee_stats_merge_row, REFEREE_STATS_TABLE};
use crate::db::{merge_rows, MergeRow};
use crate::domain::{Address, AffiliateRefereeStats, BlockHeight, Decimal};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;

/// Windowed contribution for one referee.
#[derive(Debug, Clone)]
struct RefereeDelta {
    affiliate_address: Address,
    referral_block: BlockHeight,
    earnings: Decimal,
    maker_trades: i64,
    taker_trades: i64,
    maker_fees: Decimal,
    taker_fees: Decimal,
    maker_rebates: Decimal,
    liquidation_fees: Decimal,
    volume: Decimal,
}

impl RefereeDelta {
    fn new(fill: &AttributedFill) -> Self {
        RefereeDelta {
            affiliate_address: fill.affiliate_address.clone(),
            referral_block: fill.referred_at_block,
            earnings: Decimal::zero(),
            maker_trades: 0,
            taker_trades: 0,
            maker_fees: Decimal::zero(),
            taker_fees: Decimal::zero(),
            maker_rebates: Decimal::zero(),
            liquidation_fees: Decimal::zero(),
            volume: Decimal::zero(),
        }
    }

    fn absorb(&mut self, fill: &AttributedFill) {
        use crate::domain::{FillType, Liquidity};

        self.earnings = self.earnings + fill.affiliate_rev_share;
        self.volume = self.volume + fill.notional();

        match fill.liquidity {
            // LIQUIDATION (liquidation-maker) fills land in the ordinary
            // maker buckets; only the taker side of a liquidation gets its
            // own bucket.
            Liquidity::Maker => {
                self.maker_trades += 1;
                if fill.fee.is_positive() {
                    self.maker_fees = self.maker_fees + fill.fee;
                } else if fill.fee.is_negative() {
                    self.maker_rebates = self.maker_rebates + fill.fee;
                }
            }
            Liquidity::Taker => {
                self.taker_trades += 1;
                match fill.fill_type {
                    FillType::Limit => self.taker_fees = self.taker_fees + fill.fee,
                    FillType::Liquidated => {
                        self.liquidation_fees = self.liquidation_fees + fill.fee
                    }
                    FillType::Liquidation => {}
                }
            }
        }
    }
}

/// Aggregate fills in `(window_start, window_end]` into per-referee running
/// totals, in one transaction.
///
/// An empty or inverted window is a guaranteed no-op. A referee's row first
/// appears with its first eligible fill.
///
/// # Errors
/// Returns an error if the transaction fails; nothing is committed in that
/// case.
pub async fn update_referee_stats(
    pool: &SqlitePool,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<AggregationSummary, AggregationError> {
    let window = Window::new(window_start, window_end);
    if window.is_empty() {
        return Ok(AggregationSummary::empty());
    }

    let mut tx = pool.begin().await?;
    let summary = aggregate_window(&mut tx, &window).await?;
    tx.commit().await?;
    Ok(summary)
}

/// Core of the per-referee rollup, running on the caller's transaction.
pub(crate) async fn aggregate_window(
    conn: &mut SqliteConnection,
    window: &Window,
) -> Result<AggregationSummary, AggregationError> {
    if window.is_empty() {
        return Ok(AggregationSummary::empty());
    }

    let fills = eligibility::attributed_fills_in_window(&mut *conn, window).await?;
    if fills.is_empty() {
        return Ok(AggregationSummary::empty());
    }

    let mut deltas: HashMap<Address, RefereeDelta> = HashMap::new();
    for fill in &fills {
        deltas
            .entry(fill.referee_address.clone())
            .or_insert_with(|| RefereeDelta::new(fill))
            .absorb(fill);
    }

    let mut referees: Vec<&Address> = deltas.keys().collect();
    referees.sort();

    let rows: Vec<MergeRow> = referees
        .into_iter()
        .map(|referee| {
            let delta = &deltas[referee];
            let stats = AffiliateRefereeStats {
                referee_address: referee.clone(),
                affiliate_address: delta.affiliate_address.clone(),
                affiliate_earnings: delta.earnings,
                referred_maker_trades: delta.maker_trades,
                referred_taker_trades: delta.taker_trades,
                referred_maker_fees: delta.maker_fees,
                referred_taker_fees: delta.taker_fees,
                referred_maker_rebates: delta.maker_rebates,
                referred_liquidation_fees: delta.liquidation_fees,
                referral_block_height: delta.referral_block,
                referred_total_volume: delta.volume,
            };
            referee_stats_merge_row(&stats)
        })
        .collect();

    merge_rows(&mut *conn, &REFEREE_STATS_TABLE, &rows).await?;

    Ok(AggregationSummary {
        fills_processed: fills.len(),
        rows_merged: rows.len(),
    })
}
