//! Offline import of purchases recorded outside the server.
//!
//! The input is a CSV with header `wallet,token,amount,transaction_signature,timestamp`.
//! Rows whose signature is already in the ledger (or earlier in the same file)
//! are skipped, so importing the same file twice adds nothing the second time.

use std::collections::HashSet;
use std::io::Read;

use rust_decimal::Decimal;
use serde::Deserialize;

use shared::logging;

use crate::error::Error;
use crate::ledger::Ledger;
use crate::migration::MigrationStatus;
use crate::persistence::LedgerPersistence;
use crate::records::{timestamp_now, PaymentDetails, Purchase, Token};

#[derive(Debug, Deserialize)]
struct CsvRow {
    wallet: String,
    token: String,
    amount: String,
    transaction_signature: String,
    timestamp: String,
}

/// Counts produced by one import run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub duplicates: usize,
    pub malformed: usize,
}

impl ImportReport {
    pub fn skipped(&self) -> usize {
        self.duplicates + self.malformed
    }
}

fn parse_row(row: CsvRow, id: u64) -> Result<Purchase, String> {
    let wallet = row.wallet.trim();
    if wallet.is_empty() {
        return Err("wallet is empty".to_string());
    }
    let signature = row.transaction_signature.trim();
    if signature.is_empty() {
        return Err("transaction_signature is empty".to_string());
    }
    let token = row.token.parse::<Token>().map_err(|error| error.to_string())?;
    let amount: Decimal = row
        .amount
        .trim()
        .parse()
        .map_err(|_| format!("amount {:?} is not a number", row.amount))?;
    if amount <= Decimal::ZERO {
        return Err(format!("amount {} is not positive", amount));
    }
    let timestamp = row.timestamp.trim();
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map_err(|_| format!("timestamp {:?} is not RFC 3339", row.timestamp))?;

    Ok(Purchase {
        id,
        wallet: wallet.to_string(),
        amount,
        token,
        transaction_signature: signature.to_string(),
        tier: None,
        timestamp: timestamp.to_string(),
        claimed: false,
        payment: PaymentDetails::default(),
    })
}

/// Computes the purchases `reader` would add to `ledger` without touching it.
pub fn plan_import<P, R>(
    ledger: &Ledger<P>,
    reader: R,
) -> Result<(Vec<Purchase>, ImportReport), Error>
where
    P: LedgerPersistence,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut seen: HashSet<String> = ledger
        .purchases()
        .iter()
        .map(|purchase| purchase.transaction_signature.clone())
        .collect();
    // None once u64::MAX is taken; only an actual addition needs an id
    let mut next_id = ledger.next_purchase_id().ok();
    let mut report = ImportReport::default();
    let mut additions = Vec::new();

    for (index, row) in csv_reader.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(error) => {
                if error.is_io_error() {
                    return Err(error.into());
                }
                logging::log_warning(&format!("skipping line {}: {}", line, error));
                report.malformed += 1;
                continue;
            }
        };

        if seen.contains(row.transaction_signature.trim()) {
            report.duplicates += 1;
            continue;
        }

        let id = next_id.ok_or(Error::IdSpaceExhausted)?;
        match parse_row(row, id) {
            Ok(purchase) => {
                seen.insert(purchase.transaction_signature.clone());
                additions.push(purchase);
                next_id = id.checked_add(1);
                report.added += 1;
            }
            Err(reason) => {
                logging::log_warning(&format!("skipping line {}: {}", line, reason));
                report.malformed += 1;
            }
        }
    }

    Ok((additions, report))
}

/// Imports `reader` into `ledger`, rewrites the purchases sorted by timestamp
/// and records the outcome as the migration status.
pub fn import_csv<P, R>(ledger: &mut Ledger<P>, reader: R) -> Result<ImportReport, Error>
where
    P: LedgerPersistence,
    R: Read,
{
    let (additions, report) = plan_import(ledger, reader)?;
    ledger.import_purchases(additions)?;

    let status = MigrationStatus {
        done: true,
        imported: report.added,
        skipped: report.skipped(),
        completed_at: Some(timestamp_now()),
    };
    ledger.persistence().store_migration_status(&status)?;

    logging::log_info(&format!(
        "import finished; added: {}; duplicates: {}; malformed: {}",
        report.added, report.duplicates, report.malformed
    ));
    Ok(report)
}
