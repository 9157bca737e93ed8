//! Domain types shared across the crate.

pub mod decimal;
pub mod fill;
pub mod primitives;
pub mod referral;
pub mod stats;

pub use decimal::Decimal;
pub use fill::{Fill, FillType, Liquidity};
pub use primitives::{Address, BlockHeight, Subaccount, SubaccountId};
pub use referral::Referral;
pub use stats::{AffiliateInfo, AffiliateRefereeStats};
