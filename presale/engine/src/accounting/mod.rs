//! Derived presale figures.
//!
//! Nothing here is cached: every figure is recomputed from the ledger on each
//! call so it can never drift from the recorded purchases.

use rust_decimal::Decimal;

use storage::records::{sum_amounts, Purchase};
use storage::tier::Tier;


/// Sum of every purchase amount.
pub fn total_raised(purchases: &[Purchase]) -> Decimal {
    sum_amounts(purchases.iter().map(|purchase| purchase.amount))
}

/// Sum of every tier's `max_tokens`.
pub fn total_supply(tiers: &[Tier]) -> u64 {
    tiers
        .iter()
        .fold(0u64, |supply, tier| supply.saturating_add(tier.max_tokens))
}

/// The first tier whose cumulative ceiling strictly exceeds `total_raised`.
///
/// A total exactly on a ceiling belongs to the next tier. Past the last
/// ceiling the last tier stays active. `None` only for an empty table.
pub fn current_tier(tiers: &[Tier], total_raised: Decimal) -> Option<&Tier> {
    let mut ceiling = 0u64;
    for tier in tiers {
        ceiling = ceiling.saturating_add(tier.max_tokens);
        if Decimal::from(ceiling) > total_raised {
            return Some(tier);
        }
    }
    tiers.last()
}

/// Whether every configured tier has been sold out.
pub fn tiers_exhausted(tiers: &[Tier], total_raised: Decimal) -> bool {
    !tiers.is_empty() && total_raised >= Decimal::from(total_supply(tiers))
}
