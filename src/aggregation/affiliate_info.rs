//! Per-affiliate rollup: merges windowed fill deltas into `affiliate_info`.

use crate::aggregation::eligibility::{self, AttributedFill};
use crate::aggregation::{AggregationError, AggregationSummary, Window};
use crate::db::repo::stats::{affiliate_info_merge_row, AFFILIATE_INFO_TABLE};
use crate::db::{merge_rows, MergeRow};
use crate::domain::{Address, AffiliateInfo, Decimal};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;

/// Windowed contribution for one affiliate, before the registry snapshot is
/// attached.
#[derive(Debug, Default, Clone)]
struct AffiliateDelta {
    earnings: Decimal,
    maker_trades: i64,
    taker_trades: i64,
    maker_fees: Decimal,
    taker_fees: Decimal,
    maker_rebates: Decimal,
    volume: Decimal,
}

impl AffiliateDelta {
    fn absorb(&mut self, fill: &AttributedFill) {
        use crate::domain::{FillType, Liquidity};

        self.earnings = self.earnings + fill.affiliate_rev_share;
        self.volume = self.volume + fill.notional();

        match fill.liquidity {
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
                // Liquidation-taker fees are tracked separately upstream;
                // only plain limit-taker fees land here.
                if fill.fill_type == FillType::Limit {
                    self.taker_fees = self.taker_fees + fill.fee;
                }
            }
        }
    }
}

/// Aggregate fills in `(window_start, window_end]` into per-affiliate
/// running totals, in one transaction.
///
/// An empty or inverted window is a guaranteed no-op.
///
/// # Errors
/// Returns an error if the transaction fails; nothing is committed in that
/// case.
pub async fn update_affiliate_info(
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

/// Core of the per-affiliate rollup, running on the caller's transaction.
pub(crate) async fn aggregate_window(
    conn: &mut SqliteConnection,
    window: &Window,
) -> Result<AggregationSummary, AggregationError> {
    if window.is_empty() {
        return Ok(AggregationSummary::empty());
    }

    // Point-in-time registry snapshot: every affiliate gets its membership
    // metadata refreshed even when the window holds no fills for it.
    let registry = eligibility::registry_snapshot(&mut *conn).await?;
    if registry.is_empty() {
        return Ok(AggregationSummary::empty());
    }

    let fills = eligibility::attributed_fills_in_window(&mut *conn, window).await?;

    let mut deltas: HashMap<Address, AffiliateDelta> = HashMap::new();
    for fill in &fills {
        deltas
            .entry(fill.affiliate_address.clone())
            .or_default()
            .absorb(fill);
    }

    let rows: Vec<MergeRow> = registry
        .iter()
        .map(|entry| {
            let delta = deltas
                .get(&entry.affiliate_address)
                .cloned()
                .unwrap_or_default();
            let info = AffiliateInfo {
                address: entry.affiliate_address.clone(),
                affiliate_earnings: delta.earnings,
                referred_maker_trades: delta.maker_trades,
                referred_taker_trades: delta.taker_trades,
                total_referred_maker_fees: delta.maker_fees,
                total_referred_taker_fees: delta.taker_fees,
                total_referred_maker_rebates: delta.maker_rebates,
                total_referred_users: entry.referred_users,
                first_referral_block_height: entry.first_referral_block,
                referred_total_volume: delta.volume,
            };
            affiliate_info_merge_row(&info)
        })
        .collect();

    merge_rows(&mut *conn, &AFFILIATE_INFO_TABLE, &rows).await?;

    Ok(AggregationSummary {
        fills_processed: fills.len(),
        rows_merged: rows.len(),
    })
}
