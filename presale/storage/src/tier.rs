//! Pricing tiers loaded once at startup.

use std::fs;
use std::ops::Deref;
use std::path::Path;

use serde::{Deserialize, Serialize};

use shared::logging;

use crate::error::Error;

/// A pricing bracket. Tiers are consumed in table order as the raised total grows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub tier: u32,
    pub price_usdc: f64,
    pub max_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
}

impl Tier {
    fn validate(&self) -> Result<(), Error> {
        if self.tier < 1 {
            return Err(Error::InvalidTier(format!(
                "tier number must be at least 1, got {}",
                self.tier
            )));
        }
        if !self.price_usdc.is_finite() || self.price_usdc <= 0.0 {
            return Err(Error::InvalidTier(format!(
                "tier {} price_usdc must be positive, got {}",
                self.tier, self.price_usdc
            )));
        }
        if self.max_tokens == 0 {
            return Err(Error::InvalidTier(format!(
                "tier {} max_tokens must be positive",
                self.tier
            )));
        }
        if self.duration_days == Some(0) {
            return Err(Error::InvalidTier(format!(
                "tier {} duration_days must be positive when present",
                self.tier
            )));
        }
        Ok(())
    }
}

/// Ordered, immutable tier table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl TierTable {
    /// Builds a table, rejecting any tier that violates its field constraints.
    pub fn new(tiers: Vec<Tier>) -> Result<TierTable, Error> {
        for tier in &tiers {
            tier.validate()?;
        }
        Ok(TierTable { tiers })
    }

    pub fn from_json(json: &str) -> Result<TierTable, Error> {
        let tiers: Vec<Tier> = serde_json::from_str(json)?;
        TierTable::new(tiers)
    }

    /// Reads the tier configuration at `path`.
    ///
    /// Never fails: an unreadable or invalid file is logged and yields an empty
    /// table, which leaves the presale without an active tier.
    pub fn load<P: AsRef<Path>>(path: P) -> TierTable {
        let path = path.as_ref();
        let result = fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|json| TierTable::from_json(&json));

        match result {
            Ok(table) => {
                logging::log_info(&format!(
                    "loaded {} tiers from {}",
                    table.len(),
                    path.display()
                ));
                table
            }
            Err(error) => {
                logging::log_error(&format!(
                    "failed to load tiers from {}: {}; continuing with no tiers",
                    path.display(),
                    error
                ));
                TierTable::default()
            }
        }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }
}

impl Deref for TierTable {
    type Target = [Tier];

    fn deref(&self) -> &[Tier] {
        &self.tiers
    }
}
