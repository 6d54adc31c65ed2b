// src/load/table.rs

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::report::TableReport;
use crate::error::{LoadError, Result};
use crate::schema::{CensusTableSpec, IDENTITY_COUNT};
use crate::store::{BulkLoader, SqlValue, TableStore};

const DELIMITER: u8 = b',';

/// Cut one comma-separated data line down to `spec`'s row: the identity
/// fields, then the table's own value slice.
pub fn build_row(spec: &CensusTableSpec, line: &[u8]) -> std::result::Result<Vec<SqlValue>, String> {
    let fields: Vec<&[u8]> = line.split(|b| *b == DELIMITER).collect();
    let range = spec.value_range();
    if fields.len() < range.end {
        return Err(format!(
            "table {} needs {} fields (offset {} + {} + {}), line has {}",
            spec.name,
            range.end,
            spec.column_offset,
            IDENTITY_COUNT,
            spec.column_count,
            fields.len()
        ));
    }

    let mut row = Vec::with_capacity(spec.columns.len());
    for raw in &fields[..IDENTITY_COUNT] {
        row.push(SqlValue::Text(String::from_utf8_lossy(raw).trim().to_string()));
    }
    let names = spec.columns.get(IDENTITY_COUNT..).unwrap_or_default();
    for (raw, column) in fields[range].iter().zip(names) {
        let text = String::from_utf8_lossy(raw);
        let value = text.trim().parse::<i32>().map_err(|_| {
            format!(
                "table {} column {} value '{}' is not an integer",
                spec.name, column, text
            )
        })?;
        row.push(SqlValue::Integer(value));
    }
    Ok(row)
}

/// Replace one statistical table with the contents of its data file.
///
/// The DDL runs before the file lock is taken. The lock is held for the
/// whole scan, and the insert transaction is opened only once the lock is
/// ours, so a task waiting on a busy file never sits on a connection.
#[instrument(level = "info", skip_all, fields(table = %spec.name, file = %spec.data_file.name()))]
pub async fn load_table<S: TableStore>(
    store: &S,
    spec: &CensusTableSpec,
    cancel: &CancellationToken,
) -> Result<TableReport> {
    let schema = spec.schema();
    store.recreate_table(&schema).await?;
    debug!(columns = schema.columns.len(), "created table");

    let mut scan = spec.data_file.lock_rewound().await?;
    let mut loader = store.begin_bulk_load(&schema).await?;

    while let Some((line_number, line)) = scan.next_line().await? {
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        let row = build_row(spec, line).map_err(|message| LoadError::Data {
            file: spec.data_file.name().to_string(),
            line_number,
            line: String::from_utf8_lossy(line).into_owned(),
            message,
        })?;
        loader.insert_row(&row).await?;
    }
    let lines = scan.lines_read();
    drop(scan);

    let rows = loader.commit().await?;
    info!(rows, lines, "loaded table");
    Ok(TableReport {
        name: spec.name.clone(),
        description: spec.description.clone(),
        data_file: spec.data_file.name().to_string(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::DataFileRegistry;
    use crate::store::MemoryStore;
    use anyhow::Result;
    use std::sync::Arc;
    use tempfile::TempDir;

    const FILE: &str = "in000072010.sf1";

    fn spec(registry: &DataFileRegistry, name: &str, offset: usize, count: usize) -> CensusTableSpec {
        let mut columns: Vec<String> = ["fileid", "stusab", "chariter", "cifsn", "logrecno"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        columns.extend((1..=count).map(|i| format!("{}{:04}", name, i)));
        CensusTableSpec {
            data_file: registry.get(FILE).unwrap(),
            column_offset: offset,
            column_count: count,
            name: name.to_string(),
            description: String::new(),
            columns,
        }
    }

    async fn registry(contents: &str) -> Result<(TempDir, DataFileRegistry)> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join(FILE), contents)?;
        let registry = DataFileRegistry::open(dir.path(), &[FILE.to_string()]).await?;
        Ok((dir, registry))
    }

    #[tokio::test]
    async fn test_tables_sharing_a_file_get_their_own_slice() -> Result<()> {
        let (_dir, registry) = registry(
            "SF1ST,IN,000,07,0000001,1,2,3,4,5\r\n\
             SF1ST,IN,000,07,0000002,6,7,8,9,10\r\n",
        )
        .await?;
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let a = spec(&registry, "p1", 0, 2);
        let b = spec(&registry, "p2", 2, 3);

        let (ra, rb) = tokio::join!(
            load_table(&store, &a, &cancel),
            load_table(&store, &b, &cancel)
        );
        assert_eq!(ra?.rows, 2);
        assert_eq!(rb?.rows, 2);

        let p1 = store.table("p1").unwrap();
        assert_eq!(p1.rows[1][4], SqlValue::Text("0000002".into()));
        assert_eq!(&p1.rows[1][5..], &[SqlValue::Integer(6), SqlValue::Integer(7)]);

        let p2 = store.table("p2").unwrap();
        assert_eq!(
            &p2.rows[0][5..],
            &[SqlValue::Integer(3), SqlValue::Integer(4), SqlValue::Integer(5)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_short_line_aborts_without_partial_commit() -> Result<()> {
        let (_dir, registry) = registry(
            "SF1ST,IN,000,07,0000001,1,2,3\n\
             SF1ST,IN,000,07,0000002,4,5\n",
        )
        .await?;
        let store = MemoryStore::new();
        let err = load_table(&store, &spec(&registry, "p9", 1, 2), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            LoadError::Data {
                file,
                line_number,
                message,
                ..
            } => {
                assert_eq!(file, FILE);
                assert_eq!(line_number, 2);
                assert!(message.contains("p9"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.table("p9").unwrap().row_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_line_in_data_file_is_fatal() -> Result<()> {
        let (_dir, registry) = registry(
            "SF1ST,IN,000,07,0000001,1\n\
             \n\
             SF1ST,IN,000,07,0000002,2\n",
        )
        .await?;
        let store = MemoryStore::new();
        let err = load_table(&store, &spec(&registry, "p1", 0, 1), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(
            matches!(err, LoadError::Data { line_number: 2, ref line, .. } if line.is_empty()),
            "{err:?}"
        );
        assert_eq!(store.table("p1").unwrap().row_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_other_files_load_while_one_is_locked() -> Result<()> {
        let dir = TempDir::new()?;
        let other = "in000032010.sf1";
        std::fs::write(dir.path().join(FILE), "SF1ST,IN,000,07,0000001,1\n")?;
        std::fs::write(dir.path().join(other), "SF1ST,IN,000,03,0000001,9\n")?;
        let registry =
            DataFileRegistry::open(dir.path(), &[FILE.to_string(), other.to_string()]).await?;

        let held = registry.require(FILE)?;
        let _scan = held.lock_rewound().await?;

        let mut s = spec(&registry, "p3", 0, 1);
        s.data_file = registry.require(other)?;
        let store = MemoryStore::new();
        let report = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            load_table(&store, &s, &CancellationToken::new()),
        )
        .await??;

        assert_eq!(report.rows, 1);
        assert_eq!(report.data_file, other);
        assert_eq!(store.table("p3").unwrap().rows[0][5], SqlValue::Integer(9));
        Ok(())
    }

    #[tokio::test]
    async fn test_non_numeric_value_is_fatal() -> Result<()> {
        let (_dir, registry) = registry("SF1ST,IN,000,07,0000001,1,,3\n").await?;
        let store = MemoryStore::new();
        let res = load_table(&store, &spec(&registry, "p3", 0, 3), &CancellationToken::new()).await;
        assert!(matches!(res, Err(LoadError::Data { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_load_commits_nothing() -> Result<()> {
        let (_dir, registry) = registry("SF1ST,IN,000,07,0000001,1\n").await?;
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let res = load_table(&store, &spec(&registry, "p1", 0, 1), &cancel).await;
        assert!(matches!(res, Err(LoadError::Cancelled)));
        assert_eq!(store.table("p1").unwrap().row_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reload_replaces_table() -> Result<()> {
        let (_dir, registry) = registry("SF1ST,IN,000,07,0000001,1\n").await?;
        let store = Arc::new(MemoryStore::new());
        let s = spec(&registry, "p1", 0, 1);
        load_table(&*store, &s, &CancellationToken::new()).await?;
        load_table(&*store, &s, &CancellationToken::new()).await?;

        let t = store.table("p1").unwrap();
        assert_eq!(t.generation, 2);
        assert_eq!(t.row_count, 1);
        Ok(())
    }
}
