//! Referral edge: "affiliate A referred referee B at block H".

use crate::domain::{Address, BlockHeight};
use serde::{Deserialize, Serialize};

/// A referrer -> referee edge recorded on-chain.
///
/// A referee has at most one referrer (uniqueness on the referee address);
/// an affiliate may have many referees. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    /// The referring affiliate.
    pub affiliate_address: Address,
    /// The referred address. Unique across the registry.
    pub referee_address: Address,
    /// Block height at which the referral was recorded. Fills of the
    /// referee before this height earn no affiliate credit.
    pub referred_at_block: BlockHeight,
}

impl Referral {
    /// Create a new Referral edge.
    pub fn new(
        affiliate_address: Address,
        referee_address: Address,
        referred_at_block: BlockHeight,
    ) -> Self {
        Referral {
            affiliate_address,
            referee_address,
            referred_at_block,
        }
    }
}
