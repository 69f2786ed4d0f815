//! Views returned by the presale engine, serialized as the http response bodies.

use rust_decimal::Decimal;
use serde::Serialize;

use storage::records::{Claim, Purchase};
use storage::tier::Tier;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PresaleStatus {
    pub raised: Decimal,
    #[serde(rename = "currentTier")]
    pub current_tier: Option<Tier>,
    #[serde(rename = "totalPurchases")]
    pub total_purchases: usize,
    #[serde(rename = "totalClaims")]
    pub total_claims: usize,
    pub spl_address: String,
    pub fee_wallet: String,
    #[serde(rename = "presaleEnded")]
    pub presale_ended: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TierOverview {
    pub tiers: Vec<Tier>,
    #[serde(rename = "currentTier")]
    pub current_tier: Option<Tier>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CanClaim {
    #[serde(rename = "canClaim")]
    pub can_claim: bool,
    /// Unclaimed amount, as a decimal string.
    pub total: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ClaimOutcome {
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub purchases: Vec<Purchase>,
    pub claims: Vec<Claim>,
    pub raised: Decimal,
    #[serde(rename = "currentTier")]
    pub current_tier: Option<Tier>,
    #[serde(rename = "presaleEnded")]
    pub presale_ended: bool,
}

/// Reconciliation state exposed to operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub done: bool,
    pub imported: usize,
    pub skipped: usize,
    pub completed_at: Option<String>,
    pub purchases: usize,
    pub claims: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PresaleEndedState {
    #[serde(rename = "presaleEnded")]
    pub presale_ended: bool,
}
