// src/schema/packing.rs

use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use super::catalog::Catalog;
use super::types::{CensusTableSpec, IDENTITY_COLUMNS, IDENTITY_COUNT};
use crate::config::DatasetLayout;
use crate::error::{LoadError, Result};
use crate::files::{DataFileRegistry, SharedDataFile};

/// `p11|07:11|` → table name, file number, column count.
static PACKING_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.*)\|(\d+):(\d+)\|$").expect("packing list regex"));

/// Turns packing-list lines into table specs.
///
/// Offsets are handed out in manifest order: each table gets the columns
/// following every earlier table in the same physical file. That makes the
/// parser stateful and strictly sequential.
pub struct PackingListParser {
    layout: DatasetLayout,
    registry: Arc<DataFileRegistry>,
    catalog: Arc<Catalog>,
    offsets: HashMap<String, usize>,
}

impl PackingListParser {
    pub fn new(layout: DatasetLayout, registry: Arc<DataFileRegistry>, catalog: Arc<Catalog>) -> Self {
        Self {
            layout,
            registry,
            catalog,
            offsets: HashMap::new(),
        }
    }

    /// `Ok(None)` for header and comment lines.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<CensusTableSpec>> {
        let caps = match PACKING_LINE_RE.captures(line) {
            Some(c) => c,
            None => return Ok(None),
        };
        let table_name = caps[1].trim().to_lowercase();
        let file_number: u32 = caps[2].parse().map_err(|e| {
            LoadError::drift(&table_name, format!("bad file number '{}': {}", &caps[2], e))
        })?;
        let column_count: usize = caps[3].parse().map_err(|e| {
            LoadError::drift(&table_name, format!("bad column count '{}': {}", &caps[3], e))
        })?;

        let data_file_name = self.layout.data_file_name(file_number);
        let data_file = self.registry.get(&data_file_name).ok_or_else(|| {
            LoadError::drift(
                &data_file_name,
                format!(
                    "census data file not recognized (built from file number {} for table {})",
                    file_number, table_name
                ),
            )
        })?;

        let offset = self.offsets.entry(data_file_name).or_insert(0);
        let column_offset = *offset;
        *offset += column_count;

        let concept = self
            .catalog
            .get(&table_name)
            .ok_or_else(|| LoadError::drift(&table_name, "API data lacks table"))?;

        let mut columns: Vec<String> = IDENTITY_COLUMNS
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        columns.extend(concept.variables.iter().map(|v| v.name.clone()));

        if columns.len() - IDENTITY_COUNT != column_count {
            return Err(LoadError::drift(
                &table_name,
                format!(
                    "column count mismatch ({} catalog variables != {} packing-list columns)",
                    columns.len() - IDENTITY_COUNT,
                    column_count
                ),
            ));
        }

        trace!(table = %table_name, file_number, column_offset, column_count, "table spec");
        Ok(Some(CensusTableSpec {
            data_file,
            column_offset,
            column_count,
            name: table_name,
            description: concept.description.clone(),
            columns,
        }))
    }
}

/// Read the packing list and hand each table spec to `tx` as it is built.
/// Closing the channel (dropping `tx`) marks the end of the manifest.
#[instrument(level = "info", skip_all, fields(file = %file.name()))]
pub async fn stream_table_specs(
    file: Arc<SharedDataFile>,
    mut parser: PackingListParser,
    tx: mpsc::Sender<CensusTableSpec>,
    cancel: CancellationToken,
) -> Result<usize> {
    let mut scan = file.lock_rewound().await?;
    let mut emitted = 0usize;

    while let Some((line_number, raw)) = scan.next_line().await? {
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        let line = String::from_utf8_lossy(raw);
        let spec = match parser.parse_line(&line) {
            Ok(Some(spec)) => spec,
            Ok(None) => continue,
            Err(e) => {
                debug!(line_number, line = %line, "packing list line rejected");
                return Err(e);
            }
        };
        if tx.send(spec).await.is_err() {
            return Err(LoadError::Cancelled);
        }
        emitted += 1;
    }

    info!(tables = emitted, "finished reading packing list");
    Ok(emitted)
}
