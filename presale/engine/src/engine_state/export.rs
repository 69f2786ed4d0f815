use storage::records::Purchase;

use crate::engine_state::error::Error;

const HEADER: [&str; 8] = [
    "id",
    "wallet",
    "token",
    "amount",
    "transaction_signature",
    "tier",
    "timestamp",
    "claimed",
];

/// Renders purchases as CSV, one row per purchase in ledger order.
pub fn purchases_to_csv(purchases: &[Purchase]) -> Result<String, Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&HEADER)
        .map_err(|error| Error::Export(error.to_string()))?;

    for purchase in purchases {
        writer
            .write_record(&[
                purchase.id.to_string(),
                purchase.wallet.clone(),
                purchase.token.to_string(),
                purchase.amount.normalize().to_string(),
                purchase.transaction_signature.clone(),
                purchase.tier.map(|tier| tier.to_string()).unwrap_or_default(),
                purchase.timestamp.clone(),
                purchase.claimed.to_string(),
            ])
            .map_err(|error| Error::Export(error.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| Error::Export(error.to_string()))?;
    String::from_utf8(bytes).map_err(|error| Error::Export(error.to_string()))
}
