//! Dictionary mapping
//!
//! Planning threads a reference to each dictionary-encoded column's value
//! dictionary through the execution plans. Resolving codes to values happens
//! outside this crate.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::schema::TableIdentity;

/// Opaque handle to a loaded value dictionary
pub trait DictionaryHandle: Debug + Send + Sync {
    /// Column the dictionary belongs to
    fn column_id(&self) -> &str;
}

/// Supplies dictionary handles by column id
pub trait DictionaryProvider: Send + Sync {
    fn dictionary(&self, table: &TableIdentity, column_id: &str) -> Option<Arc<dyn DictionaryHandle>>;
}

/// Column id to dictionary handle, shared by all plans of a query
pub type DictionaryMapping = BTreeMap<String, Arc<dyn DictionaryHandle>>;

/// Provider for tables without value dictionaries loaded
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDictionaries;

impl DictionaryProvider for NoDictionaries {
    fn dictionary(&self, _table: &TableIdentity, _column_id: &str) -> Option<Arc<dyn DictionaryHandle>> {
        None
    }
}

/// Dictionary handle carrying only the column id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDictionary {
    column_id: String,
}

impl ColumnDictionary {
    pub fn new(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
        }
    }
}

impl DictionaryHandle for ColumnDictionary {
    fn column_id(&self) -> &str {
        &self.column_id
    }
}

/// Builds the mapping for the given columns, skipping columns the provider
/// has no dictionary for.
pub fn build_mapping<'a>(
    provider: &dyn DictionaryProvider,
    table: &TableIdentity,
    column_ids: impl IntoIterator<Item = &'a str>,
) -> DictionaryMapping {
    column_ids
        .into_iter()
        .filter_map(|id| provider.dictionary(table, id).map(|d| (id.to_string(), d)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllColumns;

    impl DictionaryProvider for AllColumns {
        fn dictionary(&self, _table: &TableIdentity, column_id: &str) -> Option<Arc<dyn DictionaryHandle>> {
            Some(Arc::new(ColumnDictionary::new(column_id)))
        }
    }

    #[test]
    fn test_build_mapping() {
        let table = TableIdentity::new("/s", "db", "t", "1");
        let mapping = build_mapping(&AllColumns, &table, ["a", "b"]);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["b"].column_id(), "b");

        let empty = build_mapping(&NoDictionaries, &table, ["a"]);
        assert!(empty.is_empty());
    }
}
