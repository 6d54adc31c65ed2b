// src/load/geo.rs

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::config::QUEUE_DEPTH;
use crate::error::Result;
use crate::files::SharedDataFile;
use crate::geo::{geo_schema, stream_geo_locations, FieldDescriptor};
use crate::store::{BulkLoader, TableStore};

/// Replace `geo_locations` with the contents of the geographic file.
///
/// The parser runs as its own task feeding a bounded queue; this side owns
/// the single insert transaction. The parser's result is checked before the
/// commit, so a bad line late in the file never leaves a partial table.
#[instrument(level = "info", skip_all, fields(file = %file.name()))]
pub async fn load_geo_locations<S: TableStore>(
    store: &S,
    file: Arc<SharedDataFile>,
    fields: &'static [FieldDescriptor],
    cancel: CancellationToken,
) -> Result<u64> {
    let schema = geo_schema(fields);
    store.recreate_table(&schema).await?;

    let (tx, mut rx) = mpsc::channel(QUEUE_DEPTH);
    let producer = tokio::spawn(stream_geo_locations(file, fields, tx, cancel));

    let mut loader = store.begin_bulk_load(&schema).await?;
    while let Some(record) = rx.recv().await {
        loader.insert_row(&record.into_row()).await?;
    }
    let parsed = producer.await??;

    let rows = loader.commit().await?;
    info!(rows, parsed, "loaded geo locations");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::files::DataFileRegistry;
    use crate::geo::fields::{numeric, text};
    use crate::store::{MemoryStore, SqlValue};
    use anyhow::Result;
    use tempfile::TempDir;

    static LAYOUT: &[FieldDescriptor] = &[
        text("File Identification", "FILEID", 6, 1),
        text("Logical Record Number", "LOGRECNO", 7, 7),
        numeric("Population", "POP100", 9, 14),
        text("Name", "NAME", 12, 23),
    ];

    async fn geo_file(contents: &str) -> Result<(TempDir, DataFileRegistry)> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("ingeo2010.sf1"), contents)?;
        let registry = DataFileRegistry::open(dir.path(), &["ingeo2010.sf1".to_string()]).await?;
        Ok((dir, registry))
    }

    #[tokio::test]
    async fn test_two_lines_give_two_rows() -> Result<()> {
        let (_dir, registry) = geo_file(
            "SF1ST 0000001  6483802Indiana     \n\
             SF1ST 0000002     1234Adams County\n",
        )
        .await?;
        let store = MemoryStore::new();
        let rows = load_geo_locations(
            &store,
            registry.require("ingeo2010.sf1")?,
            LAYOUT,
            CancellationToken::new(),
        )
        .await?;

        assert_eq!(rows, 2);
        let table = store.table("geo_locations").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            table.rows[0],
            vec![
                SqlValue::Text("SF1ST".into()),
                SqlValue::Text("0000001".into()),
                SqlValue::Integer(6_483_802),
                SqlValue::Text("Indiana".into()),
            ]
        );
        assert_eq!(table.rows[1][3], SqlValue::Text("Adams County".into()));
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_line_leaves_table_empty() -> Result<()> {
        let (_dir, registry) = geo_file(
            "SF1ST 0000001  6483802Indiana     \n\
             SF1ST 0000002\n",
        )
        .await?;
        let store = MemoryStore::new();
        let err = load_geo_locations(
            &store,
            registry.require("ingeo2010.sf1")?,
            LAYOUT,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, LoadError::Data { line_number: 2, .. }), "{err:?}");
        assert_eq!(store.table("geo_locations").unwrap().row_count, 0);
        Ok(())
    }
}
