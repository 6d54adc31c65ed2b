// src/load/mod.rs

pub mod geo;
pub mod report;
pub mod table;

pub use geo::load_geo_locations;
pub use report::{write_report, LoadSummary, TableReport};
pub use table::{build_row, load_table};

use chrono::Utc;
use std::{future::Future, sync::Arc};
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinSet,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{LoaderConfig, QUEUE_DEPTH};
use crate::error::{LoadError, Result};
use crate::files::DataFileRegistry;
use crate::geo::{validate_layout, GEO_FIELDS};
use crate::schema::{stream_table_specs, Catalog, PackingListParser};
use crate::store::TableStore;

/// Check the geographic layout and open every required input file.
/// Nothing has touched the store when this fails.
#[instrument(level = "info", skip_all, fields(folder = %config.data_folder.display()))]
pub async fn open_inputs(config: &LoaderConfig) -> Result<Arc<DataFileRegistry>> {
    let width = validate_layout(GEO_FIELDS)?;
    debug!(width, "geographic layout ok");
    let registry =
        DataFileRegistry::open(&config.data_folder, &config.layout.required_files()).await?;
    Ok(Arc::new(registry))
}

/// Run the geographic and statistical-table pipelines side by side.
///
/// The first error from either one cancels the other, and that first error
/// is what the caller gets back. In-flight table loads are aborted and
/// their transactions rolled back.
pub async fn run<S: TableStore>(
    config: &LoaderConfig,
    registry: Arc<DataFileRegistry>,
    catalog: Arc<Catalog>,
    store: Arc<S>,
) -> Result<LoadSummary> {
    let started_at = Utc::now();
    let start = Instant::now();
    let cancel = CancellationToken::new();

    let geo = cancel_on_error(&cancel, async {
        if !config.load_geo {
            info!("skipping geo locations");
            return Ok(None);
        }
        let file = registry.require(&config.layout.geo_file_name())?;
        load_geo_locations(&*store, file, GEO_FIELDS, cancel.clone())
            .await
            .map(Some)
    });
    let tables = cancel_on_error(
        &cancel,
        load_tables(
            config,
            Arc::clone(&registry),
            catalog,
            Arc::clone(&store),
            cancel.clone(),
        ),
    );

    let (geo_rows, mut tables) = tokio::try_join!(geo, tables)?;
    tables.sort_by(|a, b| a.name.cmp(&b.name));

    let summary = LoadSummary {
        started_at,
        finished_at: Utc::now(),
        geo_rows,
        tables,
    };
    info!(
        tables = summary.tables.len(),
        geo_rows = ?summary.geo_rows,
        rows = summary.total_rows(),
        elapsed = ?start.elapsed(),
        "load complete"
    );
    Ok(summary)
}

async fn cancel_on_error<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let res = fut.await;
    if let Err(e) = &res {
        if !matches!(e, LoadError::Cancelled) {
            warn!(error = %e, "cancelling remaining work");
        }
        cancel.cancel();
    }
    res
}

/// Read the packing list and start one loader task per table as specs
/// arrive. Finished tasks are reaped while the list is still being read so
/// a failing table stops the run early.
#[instrument(level = "info", skip_all)]
async fn load_tables<S: TableStore>(
    config: &LoaderConfig,
    registry: Arc<DataFileRegistry>,
    catalog: Arc<Catalog>,
    store: Arc<S>,
    cancel: CancellationToken,
) -> Result<Vec<TableReport>> {
    let packing_list = registry.require(&config.layout.packing_list_file_name())?;
    let parser = PackingListParser::new(config.layout.clone(), registry, catalog);

    let (tx, mut rx) = mpsc::channel(QUEUE_DEPTH);
    let producer = tokio::spawn(stream_table_specs(packing_list, parser, tx, cancel.clone()));

    let limit = (config.max_concurrent_tables > 0)
        .then(|| Arc::new(Semaphore::new(config.max_concurrent_tables)));
    let mut tasks: JoinSet<Result<TableReport>> = JoinSet::new();
    let mut reports = Vec::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(LoadError::Cancelled),
            spec = rx.recv() => {
                let Some(spec) = spec else { break };
                if !config.wants_table(&spec.name) {
                    debug!(table = %spec.name, "not selected, skipping");
                    continue;
                }
                let store = Arc::clone(&store);
                let cancel = cancel.clone();
                let limit = limit.clone();
                tasks.spawn(async move {
                    let _permit = match limit {
                        Some(sem) => Some(sem.acquire_owned().await.map_err(|_| LoadError::Cancelled)?),
                        None => None,
                    };
                    load_table(&*store, &spec, &cancel).await
                });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                let report = joined??;
                info!("Loaded table {}, {} to go", report.name, tasks.len());
                reports.push(report);
            }
        }
    }

    let listed = producer.await??;
    info!(listed, started = reports.len() + tasks.len(), "packing list done");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(LoadError::Cancelled),
            joined = tasks.join_next() => {
                let Some(joined) = joined else { break };
                let report = joined??;
                info!("Loaded table {}, {} to go", report.name, tasks.len());
                reports.push(report);
            }
        }
    }
    Ok(reports)
}
