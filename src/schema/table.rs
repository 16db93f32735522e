//! Table identity

use serde::{Deserialize, Serialize};

/// Immutable identifier scoping every block and cache entry of a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdentity {
    /// Root of the table store
    pub store_path: String,
    /// Database the table belongs to
    pub database: String,
    /// Table name
    pub table_name: String,
    /// Unique table id
    pub table_id: String,
}

impl TableIdentity {
    /// Creates a new table identity
    pub fn new(
        store_path: impl Into<String>,
        database: impl Into<String>,
        table_name: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            store_path: store_path.into(),
            database: database.into(),
            table_name: table_name.into(),
            table_id: table_id.into(),
        }
    }

    /// Directory holding the table's block files
    pub fn fact_dir(&self) -> String {
        format!(
            "{}/{}/{}/Fact",
            self.store_path.trim_end_matches('/'),
            self.database,
            self.table_name
        )
    }

    /// Block id for a block file: its path relative to the fact directory.
    ///
    /// Paths outside the fact directory are returned unchanged.
    pub fn block_id(&self, file_path: &str) -> String {
        let prefix = format!("{}/", self.fact_dir());
        file_path
            .strip_prefix(&prefix)
            .unwrap_or(file_path)
            .to_string()
    }
}
