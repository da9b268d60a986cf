use crate::api::{
    echonest::EchonestClient, rdio::RdioClient, rdio_auth::PinAuthenticator, CatalogService,
    ChartSource, CredentialProvider, PlaylistService,
};
use crate::cancel::CancelToken;
use crate::chart::{dedup_entries, HtmlChartSource};
use crate::config::{Config, ConfigStore};
use crate::error::{Result, SyncError};
use crate::playlist::replace_playlist;
use crate::retry::{retry_transient, RetryConfig};
use crate::sync::{CatalogSynchronizer, SyncOptions};
use log::info;
use std::sync::Arc;

/// The collaborators one sync run talks to. Tests swap in the in-memory
/// mocks; `from_config` wires the real clients.
pub struct Services {
    pub chart: Arc<dyn ChartSource>,
    pub catalog: Arc<dyn CatalogService>,
    pub playlist: Arc<dyn PlaylistService>,
    pub credentials: Arc<dyn CredentialProvider>,
}

impl Services {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            chart: Arc::new(HtmlChartSource::new(cfg.chart_url.clone())),
            catalog: Arc::new(EchonestClient::new(
                cfg.service_keys.echonest_api_key.clone(),
                cfg.region.clone(),
                cfg.rate_limit_per_minute,
            )),
            playlist: Arc::new(RdioClient::new(
                cfg.service_keys.rdio_consumer_key.clone(),
                cfg.service_keys.rdio_consumer_secret.clone(),
            )),
            credentials: Arc::new(PinAuthenticator::new(
                cfg.service_keys.rdio_consumer_key.clone(),
                cfg.service_keys.rdio_consumer_secret.clone(),
            )),
        }
    }
}

/// Everything bootstrap resolved, plus the possibly updated config value
/// for the caller to persist.
pub struct Bootstrapped {
    pub config: Config,
    pub catalog_id: String,
    pub playlist_key: String,
}

/// Resolve access credentials, playlist key and catalog id, creating
/// whatever the config does not name yet. The playlist side and the
/// catalog side touch disjoint config fields and run concurrently; both
/// must finish before the sync proper starts.
pub async fn bootstrap(cfg: &Config, services: &Services) -> Result<Bootstrapped> {
    let playlist_side = async {
        let access = match &cfg.access {
            Some(access) => access.clone(),
            None => services.credentials.obtain_access_credentials().await?,
        };
        services.playlist.set_access(access.clone()).await;
        let playlist_key = match &cfg.playlist_key {
            Some(key) => key.clone(),
            None => {
                info!("creating playlist '{}'", cfg.playlist_name);
                services.playlist.create_playlist(&cfg.playlist_name, "").await?
            }
        };
        Ok::<_, SyncError>((access, playlist_key))
    };

    let catalog_side = async {
        match &cfg.catalog_id {
            Some(id) => Ok(id.clone()),
            None => {
                info!("creating catalog '{}'", cfg.catalog_name);
                services.catalog.create_catalog(&cfg.catalog_name).await
            }
        }
    };

    let ((access, playlist_key), catalog_id) = futures::try_join!(playlist_side, catalog_side)?;

    let mut updated = cfg.clone();
    updated.access = Some(access);
    updated.playlist_key = Some(playlist_key.clone());
    updated.catalog_id = Some(catalog_id.clone());
    Ok(Bootstrapped {
        config: updated,
        catalog_id,
        playlist_key,
    })
}

/// One full sync: bootstrap, scrape the chart, dedup, rewrite the catalog
/// in chart order, read the resolved track keys back, replace the
/// playlist's contents with them.
pub async fn run_sync_once(
    store: &ConfigStore,
    services: &Services,
    cancel: &CancelToken,
) -> Result<()> {
    let initial = store.load()?;
    let resolved = bootstrap(&initial, services).await?;
    if resolved.config != initial {
        store.save(&resolved.config)?;
        info!("config updated at {}", store.path().display());
    }
    let cfg = resolved.config;

    let retry = RetryConfig::from_max_retries(cfg.max_retries_on_error);
    let entries = {
        let chart = Arc::clone(&services.chart);
        retry_transient(&retry, cancel, "chart fetch", move || {
            let chart = Arc::clone(&chart);
            async move { chart.fetch_entries().await }
        })
        .await?
    };
    let entries = dedup_entries(entries);
    info!("chart yielded {} unique entries", entries.len());

    let synchronizer = CatalogSynchronizer::new(
        Arc::clone(&services.catalog),
        SyncOptions::from_config(&cfg),
        cancel.clone(),
    );
    let keys = synchronizer.sync(&resolved.catalog_id, &entries).await?;

    replace_playlist(services.playlist.as_ref(), &resolved.playlist_key, &keys).await?;
    info!(
        "playlist {} now mirrors the chart ({} tracks)",
        resolved.playlist_key,
        keys.len()
    );
    Ok(())
}
