//! Domain primitives: Address, SubaccountId, BlockHeight, Subaccount.

use serde::{Deserialize, Serialize};

/// Wallet address (bech32 or hex string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create an Address from a string.
    pub fn new(addr: String) -> Self {
        Address(addr)
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque subaccount identifier. Fills are keyed by subaccount; the
/// subaccounts table resolves each one to its owning address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubaccountId(pub String);

impl SubaccountId {
    /// Create a SubaccountId from a string.
    pub fn new(id: String) -> Self {
        SubaccountId(id)
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubaccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// On-chain block height. The upstream event format carries heights as
/// strings; the core keeps them integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHeight(pub i64);

impl BlockHeight {
    /// Create a BlockHeight.
    pub fn new(height: i64) -> Self {
        BlockHeight(height)
    }

    /// Get the underlying height value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A subaccount and its owning address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subaccount {
    /// Opaque subaccount identifier.
    pub id: SubaccountId,
    /// Owning wallet address.
    pub owner: Address,
    /// Subaccount number under the owner.
    pub number: i32,
}
