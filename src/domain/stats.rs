//! Running-total rows produced by the aggregators.

use crate::domain::{Address, BlockHeight, Decimal};
use serde::{Deserialize, Serialize};

/// Lifetime totals per affiliate, keyed by affiliate address.
///
/// Additive fields accumulate a non-negative delta per aggregation run
/// (maker rebates may move negative); `total_referred_users` and
/// `first_referral_block_height` are registry snapshots overwritten each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateInfo {
    /// Affiliate address.
    pub address: Address,
    /// Sum of revenue share over all eligible referred fills.
    pub affiliate_earnings: Decimal,
    /// Count of eligible maker-side referred fills.
    pub referred_maker_trades: i64,
    /// Count of eligible taker-side referred fills.
    pub referred_taker_trades: i64,
    /// Sum of positive maker fees.
    pub total_referred_maker_fees: Decimal,
    /// Sum of taker fees from LIMIT fills.
    pub total_referred_taker_fees: Decimal,
    /// Sum of negative maker fees.
    pub total_referred_maker_rebates: Decimal,
    /// Distinct referees currently in the registry for this affiliate.
    pub total_referred_users: i64,
    /// Minimum referral block height across this affiliate's referees.
    pub first_referral_block_height: BlockHeight,
    /// Sum of price * size over eligible referred fills.
    pub referred_total_volume: Decimal,
}

/// Lifetime totals per referred user, keyed by referee address.
///
/// Same additivity contract as [`AffiliateInfo`] at referee granularity.
/// `affiliate_address` is a denormalized label, `referral_block_height` a
/// per-referee snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateRefereeStats {
    /// Referred user address.
    pub referee_address: Address,
    /// The referring affiliate.
    pub affiliate_address: Address,
    /// Sum of revenue share over this referee's eligible fills.
    pub affiliate_earnings: Decimal,
    /// Count of eligible maker-side fills.
    pub referred_maker_trades: i64,
    /// Count of eligible taker-side fills.
    pub referred_taker_trades: i64,
    /// Sum of positive maker fees (LIQUIDATION maker fills included).
    pub referred_maker_fees: Decimal,
    /// Sum of taker fees from LIMIT fills.
    pub referred_taker_fees: Decimal,
    /// Sum of negative maker fees.
    pub referred_maker_rebates: Decimal,
    /// Sum of taker fees from LIQUIDATED fills.
    pub referred_liquidation_fees: Decimal,
    /// Block height of this referee's referral.
    pub referral_block_height: BlockHeight,
    /// Sum of price * size over eligible fills.
    pub referred_total_volume: Decimal,
}
