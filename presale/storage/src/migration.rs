use serde::{Deserialize, Serialize};

/// Outcome of the last reconciliation import, as exposed by the debug endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub done: bool,
    #[serde(default)]
    pub imported: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub completed_at: Option<String>,
}
