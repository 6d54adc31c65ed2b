// src/store/postgres.rs

use sqlx::{
    postgres::{PgArguments, PgPoolOptions},
    query::Query,
    Acquire, PgPool, Postgres, Transaction,
};
use tracing::{debug, info, instrument, warn};

use super::{sql, BulkLoader, SqlValue, TableSchema, TableStore};
use crate::error::{LoadError, Result};

/// Postgres-backed store over a connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    log_sql: bool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32, log_sql: bool) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| LoadError::store("connect", e))?;
        info!(max_connections, "connected to database");
        Ok(Self { pool, log_sql })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| LoadError::store("BEGIN", e))
    }
}

impl TableStore for PgStore {
    type Loader = PgBulkLoader;

    /// Drop runs in a savepoint so a failed drop rolls back on its own and the
    /// create still happens in the same transaction.
    #[instrument(level = "info", skip(self, schema), fields(table = %schema.name))]
    async fn recreate_table(&self, schema: &TableSchema) -> Result<()> {
        let drop_sql = sql::drop_table(schema)?;
        let create_sql = sql::create_table(schema)?;

        let mut tx = self.begin().await?;
        {
            let mut savepoint = (&mut tx)
                .begin()
                .await
                .map_err(|e| LoadError::store("SAVEPOINT", e))?;
            if self.log_sql {
                debug!("{}", drop_sql);
            }
            match sqlx::query(&drop_sql).execute(&mut *savepoint).await {
                Ok(_) => savepoint
                    .commit()
                    .await
                    .map_err(|e| LoadError::store("RELEASE SAVEPOINT", e))?,
                Err(e) => {
                    warn!(error = %e, query = %drop_sql, "error dropping table");
                    savepoint
                        .rollback()
                        .await
                        .map_err(|e| LoadError::store("ROLLBACK TO SAVEPOINT", e))?;
                }
            }
        }

        if self.log_sql {
            debug!("{}", create_sql);
        }
        sqlx::query(&create_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| LoadError::store(create_sql.clone(), e))?;
        tx.commit().await.map_err(|e| LoadError::store("COMMIT", e))?;
        info!("created table '{}'", schema.name);
        Ok(())
    }

    async fn begin_bulk_load(&self, schema: &TableSchema) -> Result<PgBulkLoader> {
        Ok(PgBulkLoader {
            table: schema.name.clone(),
            insert_sql: sql::insert_row(schema)?,
            arity: schema.columns.len(),
            tx: self.begin().await?,
            rows: 0,
            log_sql: self.log_sql,
        })
    }
}

pub struct PgBulkLoader {
    table: String,
    insert_sql: String,
    arity: usize,
    tx: Transaction<'static, Postgres>,
    rows: u64,
    log_sql: bool,
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Text(s) => query.bind(s.as_str()),
        SqlValue::Integer(i) => query.bind(*i),
        SqlValue::BigInt(i) => query.bind(*i),
    }
}

impl BulkLoader for PgBulkLoader {
    async fn insert_row(&mut self, row: &[SqlValue]) -> Result<()> {
        if row.len() != self.arity {
            return Err(LoadError::Rejected {
                table: self.table.clone(),
                message: format!("expected {} values, got {}", self.arity, row.len()),
            });
        }
        if self.log_sql {
            debug!(values = ?row, "{}", self.insert_sql);
        }
        let mut query = sqlx::query(&self.insert_sql);
        for value in row {
            query = bind_value(query, value);
        }
        query
            .execute(&mut *self.tx)
            .await
            .map_err(|e| LoadError::store(format!("{} {:?}", self.insert_sql, row), e))?;
        self.rows += 1;
        Ok(())
    }

    async fn commit(self) -> Result<u64> {
        self.tx
            .commit()
            .await
            .map_err(|e| LoadError::store(format!("COMMIT ({})", self.table), e))?;
        Ok(self.rows)
    }
}
