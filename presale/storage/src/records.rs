//! Purchase and claim records as they are stored in the ledger files.

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Returns the current time as an RFC 3339 UTC timestamp with millisecond precision.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Exact sum of `amounts`, saturating at `Decimal::MAX`.
pub fn sum_amounts<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().fold(Decimal::ZERO, |total, amount| {
        total.checked_add(amount).unwrap_or(Decimal::MAX)
    })
}

/// Currency a purchase was paid in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Token {
    Sol,
    Usdc,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Sol => write!(f, "SOL"),
            Token::Usdc => write!(f, "USDC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownToken(pub String);

impl fmt::Display for UnknownToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown token {:?}; expected SOL or USDC", self.0)
    }
}

impl FromStr for Token {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SOL" => Ok(Token::Sol),
            "USDC" => Ok(Token::Usdc),
            _ => Err(UnknownToken(s.to_string())),
        }
    }
}

/// Optional payment breakdown reported by the client alongside a purchase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_paid_usdc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_paid_sol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_paid_usdc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_paid_sol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_usdc_each: Option<f64>,
}

impl PaymentDetails {
    /// Name and value of every field that is present.
    pub fn present_fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("total_paid_usdc", self.total_paid_usdc),
            ("total_paid_sol", self.total_paid_sol),
            ("fee_paid_usdc", self.fee_paid_usdc),
            ("fee_paid_sol", self.fee_paid_sol),
            ("price_usdc_each", self.price_usdc_each),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: u64,
    pub wallet: String,
    /// Stored as a plain JSON number.
    pub amount: Decimal,
    pub token: Token,
    pub transaction_signature: String,
    /// Tier active when the purchase was recorded.
    #[serde(default)]
    pub tier: Option<u32>,
    pub timestamp: String,
    #[serde(default)]
    pub claimed: bool,
    #[serde(flatten)]
    pub payment: PaymentDetails,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub wallet: String,
    pub transaction_signature: String,
    pub timestamp: String,
}
