pub mod aggregation;
pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod orchestration;

pub use aggregation::{AggregationRunner, AggregatorKind, RunOutcome};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Address, AffiliateInfo, AffiliateRefereeStats, BlockHeight, Decimal, Fill, FillType,
    Liquidity, Referral, Subaccount, SubaccountId,
};
pub use error::AppError;
