use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::migration::MigrationStatus;
use crate::persistence::LedgerPersistence;
use crate::records::{Claim, Purchase};

#[derive(Default)]
struct Snapshot {
    purchases: Vec<Purchase>,
    claims: Vec<Claim>,
    migration_status: MigrationStatus,
}

/// In-memory persistence backend.
///
/// Clones share the same snapshot, so a test can keep one handle and give
/// another to a ledger. Writes can be switched off to simulate a failing disk.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    snapshot: Arc<Mutex<Snapshot>>,
    reject_writes: Arc<AtomicBool>,
    write_count: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Seeds the store with an existing ledger.
    pub fn with_records(purchases: Vec<Purchase>, claims: Vec<Claim>) -> Self {
        let store = InMemoryStore::new();
        if let Ok(mut snapshot) = store.snapshot.lock() {
            snapshot.purchases = purchases;
            snapshot.claims = claims;
        }
        store
    }

    /// While `true`, every `store_*` call fails with `Error::WriteRejected`.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Number of successful `store_*` calls so far.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), Error> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(Error::WriteRejected);
        }
        Ok(())
    }

    fn record_write(&self) {
        self.write_count.fetch_add(1, Ordering::SeqCst);
    }
}

impl LedgerPersistence for InMemoryStore {
    fn load_purchases(&self) -> Result<Vec<Purchase>, Error> {
        Ok(self.snapshot.lock()?.purchases.clone())
    }

    fn load_claims(&self) -> Result<Vec<Claim>, Error> {
        Ok(self.snapshot.lock()?.claims.clone())
    }

    fn store_purchases(&self, purchases: &[Purchase]) -> Result<(), Error> {
        self.check_writable()?;
        self.snapshot.lock()?.purchases = purchases.to_vec();
        self.record_write();
        Ok(())
    }

    fn store_claims(&self, claims: &[Claim]) -> Result<(), Error> {
        self.check_writable()?;
        self.snapshot.lock()?.claims = claims.to_vec();
        self.record_write();
        Ok(())
    }

    fn load_migration_status(&self) -> Result<MigrationStatus, Error> {
        Ok(self.snapshot.lock()?.migration_status.clone())
    }

    fn store_migration_status(&self, status: &MigrationStatus) -> Result<(), Error> {
        self.check_writable()?;
        self.snapshot.lock()?.migration_status = status.clone();
        self.record_write();
        Ok(())
    }
}
