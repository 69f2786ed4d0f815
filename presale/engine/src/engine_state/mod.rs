//! Purchase and claim rules over the ledger.
//!
//! All ledger mutations go through the mutex around the ledger, so a duplicate
//! signature check and the append that follows it can never interleave with
//! another request. The disk write also happens while the lock is held.

pub mod error;
pub mod export;
pub mod request;
pub mod response;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use log::Level;
use rust_decimal::Decimal;

use shared::logging;
use shared::newtypes::{CorrelationId, Validated};
use storage::ledger::Ledger;
use storage::persistence::LedgerPersistence;
use storage::records::{timestamp_now, Claim, Purchase};
use storage::tier::{Tier, TierTable};

use crate::accounting;

pub use self::error::Error;
use self::request::{BuyRequest, ClaimRequest};
use self::response::{
    CanClaim, MigrationReport, PresaleEndedState, PresaleStatus, Snapshot, TierOverview,
};

/// Static presale configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresaleSettings {
    pub spl_address: String,
    pub fee_wallet: String,
    /// Shared secret for operator endpoints; `None` disables them.
    pub admin_secret: Option<String>,
    /// Initial value of the presale-ended toggle.
    pub presale_ended: bool,
}

pub struct PresaleEngine<P> {
    tiers: TierTable,
    ledger: Mutex<Ledger<P>>,
    settings: PresaleSettings,
    ended_toggle: AtomicBool,
}

/// Compares two secrets without returning early on the first mismatching byte.
fn secrets_match(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    expected.len() == provided.len()
        && expected
            .iter()
            .zip(provided)
            .fold(0u8, |diff, (left, right)| diff | (left ^ right))
            == 0
}

impl<P: LedgerPersistence> PresaleEngine<P> {
    pub fn new(tiers: TierTable, ledger: Ledger<P>, settings: PresaleSettings) -> Self {
        let ended_toggle = AtomicBool::new(settings.presale_ended);
        PresaleEngine {
            tiers,
            ledger: Mutex::new(ledger),
            settings,
            ended_toggle,
        }
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn settings(&self) -> &PresaleSettings {
        &self.settings
    }

    fn ledger(&self) -> Result<MutexGuard<Ledger<P>>, Error> {
        Ok(self.ledger.lock()?)
    }

    fn presale_ended(&self, total_raised: Decimal) -> bool {
        self.ended_toggle.load(Ordering::SeqCst)
            || accounting::tiers_exhausted(&self.tiers, total_raised)
    }

    fn active_tier(&self, total_raised: Decimal) -> Option<Tier> {
        accounting::current_tier(&self.tiers, total_raised).cloned()
    }

    /// Records a purchase.
    ///
    /// Rejected requests leave the ledger untouched. Once appended, a purchase
    /// stays recorded even if it could not be written to disk.
    pub fn buy(
        &self,
        correlation_id: CorrelationId,
        request: Validated<BuyRequest>,
    ) -> Result<Purchase, Error> {
        let request = request.into_raw();
        let mut ledger = self.ledger()?;

        if ledger
            .find_by_signature(&request.transaction_signature)
            .is_some()
        {
            logging::log_warning(&format!(
                "duplicate transaction signature {}; correlation_id: {}",
                request.transaction_signature, correlation_id
            ));
            return Err(Error::DuplicateSignature(request.transaction_signature));
        }

        let id = ledger.next_purchase_id()?;
        let raised_before = accounting::total_raised(ledger.purchases());
        let purchase = Purchase {
            id,
            wallet: request.wallet,
            amount: request.amount,
            token: request.token,
            transaction_signature: request.transaction_signature,
            tier: accounting::current_tier(&self.tiers, raised_before).map(|tier| tier.tier),
            timestamp: timestamp_now(),
            claimed: false,
            payment: request.payment,
        };

        if let Err(error) = ledger.append_purchase(purchase.clone()) {
            logging::log_error(&format!(
                "purchase {} recorded in memory but not persisted: {}; correlation_id: {}",
                purchase.id, error, correlation_id
            ));
        }

        let raised = raised_before
            .checked_add(purchase.amount)
            .unwrap_or(Decimal::MAX);
        let mut properties = BTreeMap::new();
        properties.insert("correlation_id".to_string(), correlation_id.to_string());
        properties.insert("purchase_id".to_string(), purchase.id.to_string());
        properties.insert("wallet".to_string(), purchase.wallet.clone());
        properties.insert("amount".to_string(), purchase.amount.to_string());
        properties.insert("token".to_string(), purchase.token.to_string());
        properties.insert("raised".to_string(), raised.to_string());
        properties.insert(
            "current_tier".to_string(),
            self.active_tier(raised)
                .map(|tier| tier.tier.to_string())
                .unwrap_or_else(|| "none".to_string()),
        );
        logging::log_details(
            Level::Info,
            "purchase {purchase_id} recorded; wallet: {wallet}; amount: {amount} {token}; \
             raised: {raised}; current tier: {current_tier}"
                .to_string(),
            properties,
        );

        Ok(purchase)
    }

    /// Records a claim and flags the wallet's purchases as claimed.
    pub fn claim(
        &self,
        correlation_id: CorrelationId,
        request: Validated<ClaimRequest>,
    ) -> Result<Claim, Error> {
        let request = request.into_raw();
        let mut ledger = self.ledger()?;

        if !self.presale_ended(accounting::total_raised(ledger.purchases())) {
            return Err(Error::PresaleOngoing);
        }

        let unclaimed = ledger.unclaimed_total(&request.wallet);
        if unclaimed <= Decimal::ZERO {
            return Err(Error::NothingToClaim(request.wallet));
        }

        let marked = ledger.mark_claimed(&request.wallet);
        let claim = Claim {
            wallet: request.wallet,
            transaction_signature: request.transaction_signature,
            timestamp: timestamp_now(),
        };

        if let Err(error) = ledger.append_claim(claim.clone()) {
            logging::log_error(&format!(
                "claim by {} recorded in memory but not persisted: {}; correlation_id: {}",
                claim.wallet, error, correlation_id
            ));
        }

        logging::log_info(&format!(
            "claim recorded; wallet: {}; amount: {}; purchases: {}; correlation_id: {}",
            claim.wallet, unclaimed, marked, correlation_id
        ));

        Ok(claim)
    }

    pub fn status(&self) -> Result<PresaleStatus, Error> {
        let ledger = self.ledger()?;
        let raised = accounting::total_raised(ledger.purchases());
        Ok(PresaleStatus {
            raised,
            current_tier: self.active_tier(raised),
            total_purchases: ledger.purchases().len(),
            total_claims: ledger.claims().len(),
            spl_address: self.settings.spl_address.clone(),
            fee_wallet: self.settings.fee_wallet.clone(),
            presale_ended: self.presale_ended(raised),
        })
    }

    pub fn current_tier(&self) -> Result<Option<Tier>, Error> {
        let ledger = self.ledger()?;
        Ok(self.active_tier(accounting::total_raised(ledger.purchases())))
    }

    pub fn tier_overview(&self) -> Result<TierOverview, Error> {
        Ok(TierOverview {
            tiers: self.tiers.to_vec(),
            current_tier: self.current_tier()?,
        })
    }

    fn can_claim_locked(&self, ledger: &Ledger<P>, ended: bool, wallet: &str) -> CanClaim {
        let total = ledger.unclaimed_total(wallet.trim());
        CanClaim {
            can_claim: ended && total > Decimal::ZERO,
            total: total.normalize().to_string(),
        }
    }

    pub fn can_claim(&self, wallet: &str) -> Result<CanClaim, Error> {
        let ledger = self.ledger()?;
        let ended = self.presale_ended(accounting::total_raised(ledger.purchases()));
        Ok(self.can_claim_locked(&ledger, ended, wallet))
    }

    pub fn can_claim_bulk(
        &self,
        wallets: &[String],
    ) -> Result<BTreeMap<String, CanClaim>, Error> {
        let ledger = self.ledger()?;
        let ended = self.presale_ended(accounting::total_raised(ledger.purchases()));
        Ok(wallets
            .iter()
            .map(|wallet| (wallet.clone(), self.can_claim_locked(&ledger, ended, wallet)))
            .collect())
    }

    pub fn snapshot(&self) -> Result<Snapshot, Error> {
        let ledger = self.ledger()?;
        let raised = accounting::total_raised(ledger.purchases());
        Ok(Snapshot {
            purchases: ledger.purchases().to_vec(),
            claims: ledger.claims().to_vec(),
            raised,
            current_tier: self.active_tier(raised),
            presale_ended: self.presale_ended(raised),
        })
    }

    pub fn export_csv(&self) -> Result<String, Error> {
        let ledger = self.ledger()?;
        export::purchases_to_csv(ledger.purchases())
    }

    /// Fails with `Error::Unauthorized` unless `provided` matches the configured secret.
    pub fn check_admin_secret(&self, provided: Option<&str>) -> Result<(), Error> {
        match (self.settings.admin_secret.as_ref(), provided) {
            (Some(expected), Some(provided))
                if !expected.is_empty() && secrets_match(expected, provided) =>
            {
                Ok(())
            }
            _ => Err(Error::Unauthorized),
        }
    }

    pub fn migration_status(&self, admin_secret: Option<&str>) -> Result<MigrationReport, Error> {
        self.check_admin_secret(admin_secret)?;
        let ledger = self.ledger()?;
        let status = ledger
            .persistence()
            .load_migration_status()
            .unwrap_or_else(|error| {
                logging::log_warning(&format!("failed to read migration status: {}", error));
                Default::default()
            });
        Ok(MigrationReport {
            done: status.done,
            imported: status.imported,
            skipped: status.skipped,
            completed_at: status.completed_at,
            purchases: ledger.purchases().len(),
            claims: ledger.claims().len(),
        })
    }

    /// Explicit operator toggle for the presale-ended flag. Tier exhaustion
    /// still ends the presale regardless of the toggle.
    pub fn set_presale_ended(
        &self,
        admin_secret: Option<&str>,
        ended: bool,
    ) -> Result<PresaleEndedState, Error> {
        self.check_admin_secret(admin_secret)?;
        let ledger = self.ledger()?;
        self.ended_toggle.store(ended, Ordering::SeqCst);
        logging::log_info(&format!("presale-ended toggle set to {}", ended));
        Ok(PresaleEndedState {
            presale_ended: self.presale_ended(accounting::total_raised(ledger.purchases())),
        })
    }
}
