// src/schema/fetch.rs

use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::CatalogSource;
use crate::error::{LoadError, Result};

const MAX_RETRIES: u32 = 3;
const BACKOFF_MS: u64 = 500;

async fn get_bytes_core(client: &Client, url: &Url) -> Result<Vec<u8>> {
    debug!("Fetching {}", url);
    let fetch_err = |source| LoadError::Fetch {
        url: url.to_string(),
        source,
    };
    let body = client
        .get(url.clone())
        .send()
        .await
        .map_err(fetch_err)?
        .error_for_status()
        .map_err(fetch_err)?
        .bytes()
        .await
        .map_err(fetch_err)?;
    Ok(body.to_vec())
}

/// Bytes rather than text: the catalog names its own charset, so decoding
/// waits until the XML declaration has been read.
async fn get_bytes_with_retry(
    client: &Client,
    url: &Url,
    max_retries: u32,
    initial_backoff_ms: u64,
) -> Result<Vec<u8>> {
    let mut attempts = 0;
    loop {
        match get_bytes_core(client, url).await {
            Ok(b) => return Ok(b),
            Err(e) if attempts < max_retries => {
                attempts += 1;
                let backoff = initial_backoff_ms * 2u64.pow(attempts - 1);
                warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                error!(%url, error = %e, "Exhausted retries");
                return Err(e);
            }
        }
    }
}

/// Raw catalog document, undecoded.
#[instrument(level = "info", skip(client))]
pub async fn fetch_catalog(client: &Client, source: &CatalogSource) -> Result<Vec<u8>> {
    info!("Downloading census API documentation");
    let body = match source {
        CatalogSource::Url(url) => get_bytes_with_retry(client, url, MAX_RETRIES, BACKOFF_MS).await?,
        CatalogSource::File(path) => tokio::fs::read(path)
            .await
            .map_err(|e| LoadError::io(format!("reading catalog {}", path.display()), e))?,
    };
    debug!(bytes = body.len(), "catalog fetched");
    Ok(body)
}
