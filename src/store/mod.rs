// src/store/mod.rs

use std::future::Future;

use crate::error::Result;

pub mod memory;
pub mod postgres;
pub mod sql;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// SQL type of one loaded column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Varchar(usize),
    Integer,
    BigInt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A destination table: its name and every column after the serial `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

/// One typed cell, bound as a statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Integer(i32),
    BigInt(i64),
}

/// Where loaded tables end up.
///
/// A table is replaced wholesale: `recreate_table` drops and creates it, and
/// a `BulkLoader` inserts every row inside one transaction that only becomes
/// visible on `commit`.
pub trait TableStore: Send + Sync + 'static {
    type Loader: BulkLoader;

    fn recreate_table(&self, schema: &TableSchema) -> impl Future<Output = Result<()>> + Send;

    fn begin_bulk_load(
        &self,
        schema: &TableSchema,
    ) -> impl Future<Output = Result<Self::Loader>> + Send;
}

/// An open load transaction. Dropping it without `commit` discards every row.
pub trait BulkLoader: Send + 'static {
    fn insert_row(&mut self, row: &[SqlValue]) -> impl Future<Output = Result<()>> + Send;

    /// Commit and return the number of rows inserted.
    fn commit(self) -> impl Future<Output = Result<u64>> + Send;
}
