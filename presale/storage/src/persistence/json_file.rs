use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;
use crate::migration::MigrationStatus;
use crate::persistence::LedgerPersistence;
use crate::records::{Claim, Purchase};

pub const PURCHASES_FILE: &str = "purchases.json";
pub const CLAIMS_FILE: &str = "claims.json";
pub const MIGRATION_FILE: &str = "migration.json";
pub const CORRUPT_SUFFIX: &str = ".corrupt";

/// Stores each collection as a pretty printed JSON array in its own file.
///
/// Files are rewritten wholesale; a crash in the middle of a write can leave a
/// truncated file behind.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens the store rooted at `dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<JsonFileStore, Error> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(JsonFileStore { dir })
    }

    /// Points the store at `dir` without touching the filesystem. A missing
    /// directory reads as an empty ledger; stores fail until it exists.
    pub fn existing<P: AsRef<Path>>(dir: P) -> JsonFileStore {
        JsonFileStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn purchases_path(&self) -> PathBuf {
        self.dir.join(PURCHASES_FILE)
    }

    pub fn claims_path(&self) -> PathBuf {
        self.dir.join(CLAIMS_FILE)
    }

    pub fn migration_path(&self) -> PathBuf {
        self.dir.join(MIGRATION_FILE)
    }
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, Error> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(ref error) if error.kind() == ErrorKind::NotFound => Ok(T::default()),
        Err(error) => Err(error.into()),
    }
}

/// Renames `path` to the first free `<path>.corrupt[.N]`.
fn set_aside(path: &Path) -> Result<Option<PathBuf>, Error> {
    if !path.exists() {
        return Ok(None);
    }
    let mut target = path.as_os_str().to_owned();
    target.push(CORRUPT_SUFFIX);
    let mut candidate = PathBuf::from(&target);
    let mut attempt = 0u32;
    while candidate.exists() {
        attempt += 1;
        let mut numbered = target.clone();
        numbered.push(format!(".{}", attempt));
        candidate = PathBuf::from(numbered);
    }
    fs::rename(path, &candidate)?;
    Ok(Some(candidate))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

impl LedgerPersistence for JsonFileStore {
    fn load_purchases(&self) -> Result<Vec<Purchase>, Error> {
        read_json(&self.purchases_path())
    }

    fn load_claims(&self) -> Result<Vec<Claim>, Error> {
        read_json(&self.claims_path())
    }

    fn store_purchases(&self, purchases: &[Purchase]) -> Result<(), Error> {
        write_json(&self.purchases_path(), purchases)
    }

    fn store_claims(&self, claims: &[Claim]) -> Result<(), Error> {
        write_json(&self.claims_path(), claims)
    }

    fn load_migration_status(&self) -> Result<MigrationStatus, Error> {
        read_json(&self.migration_path())
    }

    fn store_migration_status(&self, status: &MigrationStatus) -> Result<(), Error> {
        write_json(&self.migration_path(), status)
    }

    fn set_aside_purchases(&self) -> Result<Option<PathBuf>, Error> {
        set_aside(&self.purchases_path())
    }

    fn set_aside_claims(&self) -> Result<Option<PathBuf>, Error> {
        set_aside(&self.claims_path())
    }
}
