// src/store/memory.rs

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use super::{BulkLoader, SqlValue, TableSchema, TableStore};
use crate::error::{LoadError, Result};

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub schema: Option<TableSchema>,
    pub rows: Vec<Vec<SqlValue>>,
    pub row_count: u64,
    /// How many times the table has been (re)created.
    pub generation: u32,
}

/// In-process store. Keeps rows for inspection, or only counts them when
/// built with [`MemoryStore::counting`] so a full release can be validated
/// without a database.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<BTreeMap<String, MemoryTable>>>,
    retain_rows: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(BTreeMap::new())),
            retain_rows: true,
        }
    }

    pub fn counting() -> Self {
        Self {
            retain_rows: false,
            ..Self::new()
        }
    }

    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.lock().get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, MemoryTable>> {
        // a poisoned map only means a test thread panicked mid-insert
        self.tables.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl TableStore for MemoryStore {
    type Loader = MemoryBulkLoader;

    async fn recreate_table(&self, schema: &TableSchema) -> Result<()> {
        let mut tables = self.lock();
        let generation = tables.get(&schema.name).map_or(0, |t| t.generation) + 1;
        tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema: Some(schema.clone()),
                rows: Vec::new(),
                row_count: 0,
                generation,
            },
        );
        Ok(())
    }

    async fn begin_bulk_load(&self, schema: &TableSchema) -> Result<MemoryBulkLoader> {
        if !self.lock().contains_key(&schema.name) {
            return Err(LoadError::Rejected {
                table: schema.name.clone(),
                message: "table does not exist".into(),
            });
        }
        Ok(MemoryBulkLoader {
            store: self.clone(),
            table: schema.name.clone(),
            arity: schema.columns.len(),
            pending: Vec::new(),
            count: 0,
        })
    }
}

/// Rows stay private to the loader until `commit`.
pub struct MemoryBulkLoader {
    store: MemoryStore,
    table: String,
    arity: usize,
    pending: Vec<Vec<SqlValue>>,
    count: u64,
}

impl BulkLoader for MemoryBulkLoader {
    async fn insert_row(&mut self, row: &[SqlValue]) -> Result<()> {
        if row.len() != self.arity {
            return Err(LoadError::Rejected {
                table: self.table.clone(),
                message: format!("expected {} values, got {}", self.arity, row.len()),
            });
        }
        if self.store.retain_rows {
            self.pending.push(row.to_vec());
        }
        self.count += 1;
        Ok(())
    }

    async fn commit(self) -> Result<u64> {
        let mut tables = self.store.lock();
        let table = tables
            .get_mut(&self.table)
            .ok_or_else(|| LoadError::Rejected {
                table: self.table.clone(),
                message: "table dropped during load".into(),
            })?;
        table.rows.extend(self.pending);
        table.row_count += self.count;
        Ok(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ColumnDef, ColumnType};
    use anyhow::Result;

    fn schema() -> TableSchema {
        TableSchema {
            name: "t".into(),
            columns: vec![
                ColumnDef::new("a", ColumnType::Varchar(3)),
                ColumnDef::new("b", ColumnType::Integer),
            ],
        }
    }

    fn row(a: &str, b: i32) -> Vec<SqlValue> {
        vec![SqlValue::Text(a.into()), SqlValue::Integer(b)]
    }

    #[tokio::test]
    async fn test_rows_visible_only_after_commit() -> Result<()> {
        let store = MemoryStore::new();
        store.recreate_table(&schema()).await?;

        let mut loader = store.begin_bulk_load(&schema()).await?;
        loader.insert_row(&row("x", 1)).await?;
        loader.insert_row(&row("y", 2)).await?;
        assert_eq!(store.table("t").unwrap().rows.len(), 0);
        assert_eq!(loader.commit().await?, 2);
        assert_eq!(store.table("t").unwrap().rows, vec![row("x", 1), row("y", 2)]);

        // abandoned load leaves nothing behind
        let mut loader = store.begin_bulk_load(&schema()).await?;
        loader.insert_row(&row("z", 3)).await?;
        drop(loader);
        assert_eq!(store.table("t").unwrap().row_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_recreate_replaces_table() -> Result<()> {
        let store = MemoryStore::new();
        store.recreate_table(&schema()).await?;
        let mut loader = store.begin_bulk_load(&schema()).await?;
        loader.insert_row(&row("x", 1)).await?;
        loader.commit().await?;

        store.recreate_table(&schema()).await?;
        let t = store.table("t").unwrap();
        assert_eq!(t.row_count, 0);
        assert_eq!(t.generation, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_arity_mismatch_and_missing_table_rejected() -> Result<()> {
        let store = MemoryStore::counting();
        assert!(store.begin_bulk_load(&schema()).await.is_err());

        store.recreate_table(&schema()).await?;
        let mut loader = store.begin_bulk_load(&schema()).await?;
        assert!(loader
            .insert_row(&[SqlValue::Text("x".into())])
            .await
            .is_err());
        loader.insert_row(&row("x", 1)).await?;
        loader.commit().await?;
        let t = store.table("t").unwrap();
        assert_eq!(t.row_count, 1);
        assert!(t.rows.is_empty());
        Ok(())
    }
}
