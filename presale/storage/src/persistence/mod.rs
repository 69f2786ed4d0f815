//! Backends the ledger mirrors its records to.

pub mod in_memory;
pub mod json_file;

use std::path::PathBuf;

use crate::error::Error;
use crate::migration::MigrationStatus;
use crate::records::{Claim, Purchase};

pub use self::in_memory::InMemoryStore;
pub use self::json_file::JsonFileStore;

/// Whole-snapshot persistence for the ledger.
///
/// Loading a collection that was never stored yields an empty collection.
/// Every `store_*` call replaces the previous snapshot entirely.
pub trait LedgerPersistence {
    fn load_purchases(&self) -> Result<Vec<Purchase>, Error>;

    fn load_claims(&self) -> Result<Vec<Claim>, Error>;

    fn store_purchases(&self, purchases: &[Purchase]) -> Result<(), Error>;

    fn store_claims(&self, claims: &[Claim]) -> Result<(), Error>;

    fn load_migration_status(&self) -> Result<MigrationStatus, Error>;

    fn store_migration_status(&self, status: &MigrationStatus) -> Result<(), Error>;

    /// Moves an unreadable purchases snapshot out of the way so the next store
    /// does not overwrite it. Returns where it went, if anywhere.
    fn set_aside_purchases(&self) -> Result<Option<PathBuf>, Error> {
        Ok(None)
    }

    /// Same as [`set_aside_purchases`](LedgerPersistence::set_aside_purchases)
    /// for claims.
    fn set_aside_claims(&self) -> Result<Option<PathBuf>, Error> {
        Ok(None)
    }
}
