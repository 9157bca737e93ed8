//! Referral eligibility filter shared by both aggregators.
//!
//! A referee's fill counts toward attribution iff the fill's block height is
//! at or after the referee's recorded referral height. The filter joins the
//! referral registry to fills through subaccount ownership; fills whose
//! subaccount has no resolvable owner or whose owner has no referral simply
//! fall out of the join. That is steady state for the vast majority of
//! fills, not an error.

use crate::aggregation::{AggregationError, Window};
use crate::domain::{Address, BlockHeight, Decimal, FillType, Liquidity};
use sqlx::{Row, SqliteConnection};

/// An eligible fill annotated with its referral edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedFill {
    pub affiliate_address: Address,
    pub referee_address: Address,
    pub referred_at_block: BlockHeight,
    pub liquidity: Liquidity,
    pub fill_type: FillType,
    pub fee: Decimal,
    pub affiliate_rev_share: Decimal,
    pub price: Decimal,
    pub size: Decimal,
}

impl AttributedFill {
    /// Notional value (price * size).
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// Registry snapshot for one affiliate: distinct referees and the earliest
/// referral height, taken fresh from the full registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub affiliate_address: Address,
    pub referred_users: i64,
    pub first_referral_block: BlockHeight,
}

fn parse_decimal(raw: &str, column: &'static str) -> Result<Decimal, AggregationError> {
    Decimal::from_str_canonical(raw)
        .map_err(|_| AggregationError::CorruptValue { column })
}

/// Fetch all fills in the window `(start, end]` that pass the eligibility
/// filter, annotated with their referral edge.
///
/// The window is exclusive at the start and inclusive at the end so that a
/// fill sitting exactly on the previous run's upper bound is never processed
/// twice. The height check is inclusive: a fill at the referral block earns
/// credit.
///
/// # Errors
/// Returns an error on database failure, on an unknown liquidity/type
/// discriminant, or on a corrupt stored decimal.
pub async fn attributed_fills_in_window(
    conn: &mut SqliteConnection,
    window: &Window,
) -> Result<Vec<AttributedFill>, AggregationError> {
    let rows = sqlx::query(
        r#"
        SELECT r.affiliate_address, r.referee_address, r.referred_at_block,
               f.liquidity, f.fill_type, f.fee, f.affiliate_rev_share, f.price, f.size
        FROM affiliate_referrals r
        JOIN subaccounts s ON s.owner_address = r.referee_address
        JOIN fills f ON f.subaccount_id = s.subaccount_id
        WHERE f.created_at_ms > ? AND f.created_at_ms <= ?
          AND f.created_at_height >= r.referred_at_block
        ORDER BY f.event_id ASC
        "#,
    )
    .bind(window.start.timestamp_millis())
    .bind(window.end.timestamp_millis())
    .fetch_all(&mut *conn)
    .await?;

    let mut fills = Vec::with_capacity(rows.len());
    for row in &rows {
        let liquidity_raw: String = row.try_get("liquidity")?;
        let liquidity = Liquidity::parse(&liquidity_raw)
            .ok_or(AggregationError::CorruptValue { column: "liquidity" })?;

        let fill_type_raw: String = row.try_get("fill_type")?;
        let fill_type = FillType::parse(&fill_type_raw)
            .ok_or(AggregationError::CorruptValue { column: "fill_type" })?;

        let fee_raw: String = row.try_get("fee")?;
        let rev_share_raw: String = row.try_get("affiliate_rev_share")?;
        let price_raw: String = row.try_get("price")?;
        let size_raw: String = row.try_get("size")?;

        fills.push(AttributedFill {
            affiliate_address: Address::new(row.try_get("affiliate_address")?),
            referee_address: Address::new(row.try_get("referee_address")?),
            referred_at_block: BlockHeight::new(row.try_get("referred_at_block")?),
            liquidity,
            fill_type,
            fee: parse_decimal(&fee_raw, "fee")?,
            affiliate_rev_share: parse_decimal(&rev_share_raw, "affiliate_rev_share")?,
            price: parse_decimal(&price_raw, "price")?,
            size: parse_decimal(&size_raw, "size")?,
        });
    }

    Ok(fills)
}

/// Snapshot the full referral registry grouped by affiliate.
///
/// This is a point-in-time view, not a windowed one: referred-user counts
/// and first-referral heights reflect the registry as of the current run,
/// which is how a new referral with zero fills still shows up.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn registry_snapshot(
    conn: &mut SqliteConnection,
) -> Result<Vec<RegistryEntry>, AggregationError> {
    let rows = sqlx::query(
        r#"
        SELECT affiliate_address,
               COUNT(*) AS referred_users,
               MIN(referred_at_block) AS first_referral_block
        FROM affiliate_referrals
        GROUP BY affiliate_address
        ORDER BY affiliate_address ASC
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            Ok(RegistryEntry {
                affiliate_address: Address::new(row.try_get("affiliate_address")?),
                referred_users: row.try_get("referred_users")?,
                first_referral_block: BlockHeight::new(row.try_get("first_referral_block")?),
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?)
}
