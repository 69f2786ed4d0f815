//! The purchase and claim ledger.
//!
//! Both collections live in memory and are mirrored to a [`LedgerPersistence`]
//! backend after every mutation. The in-memory lists are the source of truth
//! while the process runs: a failed write is reported to the caller but the
//! mutation is kept.

use std::path::PathBuf;

use rust_decimal::Decimal;

use shared::logging;

use crate::error::Error;
use crate::persistence::LedgerPersistence;
use crate::records::{sum_amounts, Claim, Purchase};

pub struct Ledger<P> {
    purchases: Vec<Purchase>,
    claims: Vec<Claim>,
    persistence: P,
}

impl<P: LedgerPersistence> Ledger<P> {
    /// Loads the ledger, failing if either collection cannot be read.
    pub fn open(persistence: P) -> Result<Ledger<P>, Error> {
        let purchases = persistence.load_purchases()?;
        let claims = persistence.load_claims()?;
        Ok(Ledger {
            purchases,
            claims,
            persistence,
        })
    }

    /// Loads the ledger, replacing any unreadable collection with an empty one.
    /// A snapshot that fails to parse is set aside first so the next write
    /// cannot destroy it.
    pub fn load(persistence: P) -> Ledger<P> {
        let purchases = or_empty("purchases", persistence.load_purchases(), || {
            persistence.set_aside_purchases()
        });
        let claims = or_empty("claims", persistence.load_claims(), || {
            persistence.set_aside_claims()
        });
        logging::log_info(&format!(
            "ledger loaded with {} purchases and {} claims",
            purchases.len(),
            claims.len()
        ));
        Ledger {
            purchases,
            claims,
            persistence,
        }
    }

    pub fn purchases(&self) -> &[Purchase] {
        &self.purchases
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn find_by_signature(&self, transaction_signature: &str) -> Option<&Purchase> {
        self.purchases
            .iter()
            .find(|purchase| purchase.transaction_signature == transaction_signature)
    }

    /// Sum of the amounts of `wallet`'s purchases that are not yet claimed.
    pub fn unclaimed_total(&self, wallet: &str) -> Decimal {
        sum_amounts(
            self.purchases
                .iter()
                .filter(|purchase| purchase.wallet == wallet && !purchase.claimed)
                .map(|purchase| purchase.amount),
        )
    }

    /// One past the largest id in use, or `Error::IdSpaceExhausted` once
    /// `u64::MAX` is taken.
    pub fn next_purchase_id(&self) -> Result<u64, Error> {
        match self.purchases.iter().map(|purchase| purchase.id).max() {
            None => Ok(1),
            Some(id) => id.checked_add(1).ok_or(Error::IdSpaceExhausted),
        }
    }

    /// Appends `purchase` and persists both collections.
    pub fn append_purchase(&mut self, purchase: Purchase) -> Result<(), Error> {
        self.purchases.push(purchase);
        self.persist()
    }

    /// Appends `claim` and persists both collections.
    pub fn append_claim(&mut self, claim: Claim) -> Result<(), Error> {
        self.claims.push(claim);
        self.persist()
    }

    /// Flags every unclaimed purchase of `wallet` as claimed, returning how many
    /// changed. Not persisted until the next append.
    pub fn mark_claimed(&mut self, wallet: &str) -> usize {
        let mut marked = 0;
        for purchase in self
            .purchases
            .iter_mut()
            .filter(|purchase| purchase.wallet == wallet && !purchase.claimed)
        {
            purchase.claimed = true;
            marked += 1;
        }
        marked
    }

    /// Appends imported purchases, orders the whole list by timestamp and
    /// persists it.
    pub fn import_purchases(&mut self, purchases: Vec<Purchase>) -> Result<(), Error> {
        self.purchases.extend(purchases);
        sort_by_timestamp(&mut self.purchases);
        self.persistence.store_purchases(&self.purchases)
    }

    fn persist(&self) -> Result<(), Error> {
        self.persistence.store_purchases(&self.purchases)?;
        self.persistence.store_claims(&self.claims)
    }
}

fn or_empty<T, F>(name: &str, loaded: Result<Vec<T>, Error>, set_aside: F) -> Vec<T>
where
    F: FnOnce() -> Result<Option<PathBuf>, Error>,
{
    let error = match loaded {
        Ok(records) => return records,
        Err(error) => error,
    };
    logging::log_error(&format!(
        "failed to load {}: {}; starting with an empty list",
        name, error
    ));
    if let Error::Json(_) = error {
        match set_aside() {
            Ok(Some(path)) => logging::log_warning(&format!(
                "unreadable {} moved to {}",
                name,
                path.display()
            )),
            Ok(None) => {}
            Err(error) => logging::log_error(&format!(
                "failed to set aside unreadable {}: {}",
                name, error
            )),
        }
    }
    Vec::new()
}

/// Stable sort by parsed timestamp; unparseable timestamps go first, ordered as
/// strings.
pub(crate) fn sort_by_timestamp(purchases: &mut [Purchase]) {
    purchases.sort_by(|left, right| {
        let left_time = chrono::DateTime::parse_from_rfc3339(&left.timestamp).ok();
        let right_time = chrono::DateTime::parse_from_rfc3339(&right.timestamp).ok();
        match (left_time, right_time) {
            (Some(left_time), Some(right_time)) => left_time.cmp(&right_time),
            (left_time, right_time) => left_time
                .is_some()
                .cmp(&right_time.is_some())
                .then_with(|| left.timestamp.cmp(&right.timestamp)),
        }
    });
}
