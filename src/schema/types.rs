// src/schema/types.rs

use std::sync::Arc;

use crate::files::SharedDataFile;
use crate::store::{ColumnDef, ColumnType, TableSchema};

/// The leading fields of every data-file row, with their column widths.
pub const IDENTITY_COLUMNS: [(&str, usize); 5] = [
    ("fileid", 6),
    ("stusab", 2),
    ("chariter", 3),
    ("cifsn", 3),
    ("logrecno", 7),
];

pub const IDENTITY_COUNT: usize = IDENTITY_COLUMNS.len();

/// One statistical column from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVariable {
    pub name: String,
    pub description: String,
}

/// One catalog concept, i.e. one statistical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConcept {
    pub name: String,
    pub description: String,
    pub variable_count: usize,
    pub variables: Vec<ApiVariable>,
}

/// Everything needed to load one table: where its columns sit in which
/// physical file, and what they are called.
#[derive(Debug, Clone)]
pub struct CensusTableSpec {
    pub data_file: Arc<SharedDataFile>,
    /// Columns of earlier tables in the same file, after the identity fields.
    pub column_offset: usize,
    pub column_count: usize,
    pub name: String,
    pub description: String,
    /// Identity columns followed by one column per catalog variable.
    pub columns: Vec<String>,
}

impl CensusTableSpec {
    /// Comma-separated field range holding this table's values.
    pub fn value_range(&self) -> std::ops::Range<usize> {
        let start = IDENTITY_COUNT + self.column_offset;
        start..start + self.column_count
    }

    pub fn schema(&self) -> TableSchema {
        let identity = IDENTITY_COLUMNS
            .iter()
            .map(|(name, width)| ColumnDef::new(*name, ColumnType::Varchar(*width)));
        let values = self
            .columns
            .get(IDENTITY_COUNT..)
            .unwrap_or_default()
            .iter()
            .map(|name| ColumnDef::new(name.clone(), ColumnType::Integer));
        TableSchema {
            name: self.name.clone(),
            columns: identity.chain(values).collect(),
        }
    }
}
