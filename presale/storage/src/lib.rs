pub mod error;
pub mod ledger;
pub mod migration;
pub mod persistence;
pub mod reconcile;
pub mod records;
pub mod tier;

pub use error::Error;
