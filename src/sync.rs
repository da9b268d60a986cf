use crate::api::CatalogService;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::{BulkOp, CatalogItem, ChartEntry};
use crate::retry::{retry_transient, RetryConfig};
use crate::ticket::TicketPoller;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Tuning for one synchronizer run; values mirror the config fields.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub page_size: usize,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    pub retry: RetryConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: crate::config::MAX_PAGE_SIZE,
            poll_interval: Duration::from_millis(1000),
            poll_max_attempts: 120,
            retry: RetryConfig::default(),
        }
    }
}

impl SyncOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            page_size: cfg.page_size(),
            poll_interval: Duration::from_millis(cfg.ticket_poll_interval_ms),
            poll_max_attempts: cfg.ticket_poll_max_attempts,
            retry: RetryConfig::from_max_retries(cfg.max_retries_on_error),
        }
    }
}

/// Rewrites the remote catalog to mirror the deduplicated chart and reads
/// the playable track keys back in chart order.
///
/// The catalog has no native ordering and its reads guarantee none either,
/// so position is written into an `index` keyvalue on fill and recovered
/// by a client-side sort after the final read. Draining before filling
/// makes each run's outcome independent of whatever the previous run left
/// behind.
pub struct CatalogSynchronizer {
    catalog: Arc<dyn CatalogService>,
    opts: SyncOptions,
    cancel: CancelToken,
}

impl CatalogSynchronizer {
    pub fn new(catalog: Arc<dyn CatalogService>, opts: SyncOptions, cancel: CancelToken) -> Self {
        Self {
            catalog,
            opts,
            cancel,
        }
    }

    /// Drain, fill, resolve. A failed bulk job aborts the run; a partially
    /// drained catalog is fine because the next run drains again.
    pub async fn sync(&self, catalog_id: &str, entries: &[ChartEntry]) -> Result<Vec<String>> {
        self.drain(catalog_id).await?;
        self.fill(catalog_id, entries).await?;
        self.resolve_order(catalog_id).await
    }

    /// Read the whole catalog page by page until the total the remote
    /// reports has been accumulated.
    async fn read_all(&self, catalog_id: &str, extended: bool) -> Result<Vec<CatalogItem>> {
        let page_size = self.opts.page_size;
        let mut items: Vec<CatalogItem> = Vec::new();
        loop {
            let start = items.len();
            let page = {
                let catalog = Arc::clone(&self.catalog);
                retry_transient(&self.opts.retry, &self.cancel, "tasteprofile/read", move || {
                    let catalog = Arc::clone(&catalog);
                    async move {
                        catalog
                            .read_page(catalog_id, start, page_size, extended)
                            .await
                    }
                })
                .await?
            };
            let total = page.total;
            let got = page.items.len();
            items.extend(page.items);
            debug!("read {} of {} catalog item(s)", items.len(), total);
            if items.len() >= total {
                if items.len() > total {
                    return Err(SyncError::Protocol(format!(
                        "catalog read returned {} items, remote reported {}",
                        items.len(),
                        total
                    )));
                }
                return Ok(items);
            }
            if got == 0 {
                return Err(SyncError::Protocol(format!(
                    "catalog read stalled at {} of {} item(s)",
                    items.len(),
                    total
                )));
            }
        }
    }

    /// Delete every materialized item. Items without a remote-assigned
    /// song id have nothing to delete yet.
    pub async fn drain(&self, catalog_id: &str) -> Result<()> {
        self.cancel.check()?;
        let existing = self.read_all(catalog_id, false).await?;
        let ops: Vec<BulkOp> = existing
            .iter()
            .filter_map(|item| item.song_id.clone())
            .map(BulkOp::delete)
            .collect();
        if ops.is_empty() {
            debug!("catalog {} already empty, nothing to drain", catalog_id);
            return Ok(());
        }
        info!("draining {} item(s) from catalog {}", ops.len(), catalog_id);
        self.submit_and_wait(catalog_id, &ops).await
    }

    /// Insert the entries tagged with their position. The index keyvalue
    /// is the only ordering the catalog will retain.
    pub async fn fill(&self, catalog_id: &str, entries: &[ChartEntry]) -> Result<()> {
        self.cancel.check()?;
        if entries.is_empty() {
            warn!("no chart entries to fill catalog {} with", catalog_id);
            return Ok(());
        }
        let ops: Vec<BulkOp> = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| BulkOp::update(entry, index))
            .collect();
        info!("filling catalog {} with {} entries", catalog_id, ops.len());
        self.submit_and_wait(catalog_id, &ops).await
    }

    /// One bulk call, then block on its ticket. Mutations are never
    /// retried; rerunning the whole sync is the recovery path.
    async fn submit_and_wait(&self, catalog_id: &str, ops: &[BulkOp]) -> Result<()> {
        let ticket = self.catalog.bulk_update(catalog_id, ops).await?;
        let poller = TicketPoller::new(
            Arc::clone(&self.catalog),
            self.opts.poll_interval,
            self.opts.poll_max_attempts,
            self.cancel.clone(),
        );
        poller.await_completion(&ticket).await
    }

    /// Read everything back with tracks and keyvalues, recover chart order
    /// from the index attribute and keep the first candidate track's
    /// playable key per item.
    pub async fn resolve_order(&self, catalog_id: &str) -> Result<Vec<String>> {
        self.cancel.check()?;
        let mut items = self.read_all(catalog_id, true).await?;
        let before = items.len();
        items.retain(|item| item.order_index().is_some());
        if items.len() < before {
            warn!(
                "{} catalog item(s) carry no usable index and were skipped",
                before - items.len()
            );
        }
        items.sort_by_key(|item| item.order_index());

        let mut keys = Vec::new();
        for item in &items {
            match item.first_track_key() {
                Some(key) => keys.push(key.to_string()),
                None => debug!(
                    "no playable track for '{}' by '{}'",
                    item.song_name, item.artist_name
                ),
            }
        }
        info!(
            "resolved {} of {} catalog item(s) to track keys",
            keys.len(),
            items.len()
        );
        Ok(keys)
    }
}
