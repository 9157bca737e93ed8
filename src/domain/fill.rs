//! Fill type representing a single trade execution.
//!
//! Fills are produced by the upstream ingestion pipeline and consumed
//! read-only by the aggregators.

use crate::domain::{BlockHeight, Decimal, SubaccountId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liquidity side of a fill: maker (resting order) or taker (incoming order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Liquidity {
    /// Resting order side.
    Maker,
    /// Incoming order side.
    Taker,
}

impl Liquidity {
    /// Wire/storage string for this side.
    pub fn as_str(&self) -> &'static str {
        match self {
            Liquidity::Maker => "MAKER",
            Liquidity::Taker => "TAKER",
        }
    }

    /// Parse from the wire/storage string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MAKER" => Some(Liquidity::Maker),
            "TAKER" => Some(Liquidity::Taker),
            _ => None,
        }
    }
}

impl std::fmt::Display for Liquidity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order type that produced a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FillType {
    /// Ordinary limit-order fill.
    Limit,
    /// Taker side of a liquidation match.
    Liquidated,
    /// Maker side of a liquidation match.
    Liquidation,
}

impl FillType {
    /// Wire/storage string for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FillType::Limit => "LIMIT",
            FillType::Liquidated => "LIQUIDATED",
            FillType::Liquidation => "LIQUIDATION",
        }
    }

    /// Parse from the wire/storage string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LIMIT" => Some(FillType::Limit),
            "LIQUIDATED" => Some(FillType::Liquidated),
            "LIQUIDATION" => Some(FillType::Liquidation),
            _ => None,
        }
    }
}

impl std::fmt::Display for FillType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single trade fill/execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Unique upstream event id for this fill.
    pub event_id: String,
    /// Subaccount the fill executed against.
    pub subaccount_id: SubaccountId,
    /// Maker or taker side.
    pub liquidity: Liquidity,
    /// Order type that produced the fill.
    pub fill_type: FillType,
    /// Fee paid; negative means a rebate.
    pub fee: Decimal,
    /// Portion of the fee allocated to the referring affiliate.
    pub affiliate_rev_share: Decimal,
    /// Price per unit.
    pub price: Decimal,
    /// Size/quantity traded.
    pub size: Decimal,
    /// Time of the fill.
    pub created_at: DateTime<Utc>,
    /// Block height the fill executed at.
    pub created_at_height: BlockHeight,
}

impl Fill {
    /// Notional value of the fill (price * size).
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_liquidity_wire_strings() {
        assert_eq!(Liquidity::Maker.as_str(), "MAKER");
        assert_eq!(Liquidity::parse("TAKER"), Some(Liquidity::Taker));
        assert_eq!(Liquidity::parse("maker"), None);
    }

    #[test]
    fn test_fill_type_wire_strings() {
        assert_eq!(FillType::Liquidated.as_str(), "LIQUIDATED");
        assert_eq!(FillType::parse("LIQUIDATION"), Some(FillType::Liquidation));
        assert_eq!(FillType::parse("LIMIT"), Some(FillType::Limit));
        assert_eq!(FillType::parse("MARKET"), None);
    }

    #[test]
    fn test_liquidity_serialization() {
        let json = serde_json::to_string(&Liquidity::Maker).unwrap();
        assert_eq!(json, "\"MAKER\"");
    }

    #[test]
    fn test_fill_notional() {
        let fill = Fill {
            event_id: "evt-1".to_string(),
            subaccount_id: SubaccountId::new("sub-0".to_string()),
            liquidity: Liquidity::Taker,
            fill_type: FillType::Limit,
            fee: Decimal::from_str("1000").unwrap(),
            affiliate_rev_share: Decimal::from_str("500").unwrap(),
            price: Decimal::from_str("2.5").unwrap(),
            size: Decimal::from_str("4").unwrap(),
            created_at: DateTime::from_timestamp_millis(1_000).unwrap(),
            created_at_height: BlockHeight::new(1),
        };
        assert_eq!(fill.notional(), Decimal::from_str("10").unwrap());
    }

    #[test]
    fn test_fill_serialization_roundtrip() {
        let fill = Fill {
            event_id: "evt-1".to_string(),
            subaccount_id: SubaccountId::new("sub-0".to_string()),
            liquidity: Liquidity::Maker,
            fill_type: FillType::Liquidation,
            fee: Decimal::from_str("-1000").unwrap(),
            affiliate_rev_share: Decimal::from_str("0").unwrap(),
            price: Decimal::from_str("1").unwrap(),
            size: Decimal::from_str("1").unwrap(),
            created_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            created_at_height: BlockHeight::new(42),
        };

        let json = serde_json::to_string(&fill).unwrap();
        let deserialized: Fill = serde_json::from_str(&json).unwrap();
        assert_eq!(fill, deserialized);
    }
}
