//! Request bodies accepted by the presale engine.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use shared::newtypes::Validated;
use storage::records::{PaymentDetails, Token};

use crate::engine_state::error::Error;

/// Decodes a json request body.
///
/// A body that is not json at all is `Error::InvalidJson`; json of the wrong
/// shape is `Error::Validation`.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|_| Error::InvalidJson)?;
    serde_json::from_value(value)
        .map_err(|error| Error::Validation(format!("Invalid request: {}", error)))
}

fn require_non_blank(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BuyRequest {
    pub wallet: String,
    pub amount: Decimal,
    pub token: Token,
    pub transaction_signature: String,
    #[serde(flatten)]
    pub payment: PaymentDetails,
}

impl BuyRequest {
    pub fn validate(mut self) -> Result<Validated<BuyRequest>, Error> {
        self.wallet = self.wallet.trim().to_string();
        self.transaction_signature = self.transaction_signature.trim().to_string();
        Validated::new(self, BuyRequest::check)
    }

    fn check(&self) -> Result<(), Error> {
        require_non_blank("wallet", &self.wallet)?;
        require_non_blank("transaction_signature", &self.transaction_signature)?;
        if self.amount <= Decimal::ZERO {
            return Err(Error::NonPositiveAmount);
        }
        for (field, value) in self.payment.present_fields() {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Validation(format!(
                    "{} must not be negative",
                    field
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ClaimRequest {
    pub wallet: String,
    pub transaction_signature: String,
}

impl ClaimRequest {
    pub fn validate(mut self) -> Result<Validated<ClaimRequest>, Error> {
        self.wallet = self.wallet.trim().to_string();
        self.transaction_signature = self.transaction_signature.trim().to_string();
        Validated::new(self, ClaimRequest::check)
    }

    fn check(&self) -> Result<(), Error> {
        require_non_blank("wallet", &self.wallet)?;
        require_non_blank("transaction_signature", &self.transaction_signature)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CanClaimBulkRequest {
    pub wallets: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct PresaleEndedRequest {
    pub ended: bool,
}
