use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use sf1loader::{
    cli::Args,
    config::LoaderConfig,
    files::DataFileRegistry,
    load::{self, write_report, LoadSummary},
    schema::{fetch_catalog, Catalog},
    store::{MemoryStore, PgStore, TableStore},
};
use std::{process, sync::Arc};
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    // clap exits with status 2 on a usage error
    let args = Args::parse();

    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    let outcome = tokio::select! {
        res = run(&args) => res,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, rolling back open transactions");
            Err(anyhow::anyhow!("interrupted by user"))
        }
    };

    if let Err(e) = outcome {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(args: &Args) -> Result<()> {
    let start = Instant::now();
    let config = args.loader_config();

    // ─── 2) open every input before touching the database ────────────
    let registry = load::open_inputs(&config).await.with_context(|| {
        format!(
            "usage: sf1loader [CENSUS_DATA_FOLDER]; {} must hold the full {} release",
            config.data_folder.display(),
            config.layout.state.to_uppercase()
        )
    })?;
    info!(files = registry.len(), "opened census data files");

    // ─── 3) fetch & resolve the variable catalog ─────────────────────
    let client = Client::new();
    let body = fetch_catalog(&client, &config.catalog)
        .await
        .with_context(|| format!("fetching catalog from {}", config.catalog))?;
    let catalog = Arc::new(Catalog::parse(&body).context("resolving catalog")?);

    // ─── 4) load ─────────────────────────────────────────────────────
    let summary = if args.dry_run {
        info!("dry run, rows are counted but not stored");
        load_into(Arc::new(MemoryStore::counting()), &config, registry, catalog).await?
    } else {
        let store = PgStore::connect(&args.database_url, args.max_connections, config.log_sql)
            .await
            .context("connecting to database")?;
        let res = load_into(Arc::new(store.clone()), &config, registry, catalog).await;
        store.close().await;
        res?
    };

    // ─── 5) report ───────────────────────────────────────────────────
    if let Some(path) = &args.report {
        write_report(&summary, path)
            .with_context(|| format!("writing report {}", path.display()))?;
        info!(path = %path.display(), "wrote run report");
    }
    info!(elapsed = ?start.elapsed(), "all done");
    Ok(())
}

async fn load_into<S: TableStore>(
    store: Arc<S>,
    config: &LoaderConfig,
    registry: Arc<DataFileRegistry>,
    catalog: Arc<Catalog>,
) -> Result<LoadSummary> {
    let summary = load::run(config, registry, catalog, store)
        .await
        .context("loading census tables")?;
    for t in &summary.tables {
        info!(table = %t.name, rows = t.rows, file = %t.data_file, "{}", t.description);
    }
    Ok(summary)
}
