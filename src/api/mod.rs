pub mod budget;
pub mod echonest;
pub mod mock;
pub mod oauth;
pub mod rdio;
pub mod rdio_auth;

use crate::error::Result;
use crate::models::{
    AccessCredentials, BulkOp, CatalogPage, ChartEntry, PlaylistSummary, Ticket, TicketStatus,
};

/// Catalog port: a paginated bulk read/update store with asynchronous job
/// tickets. Implementations: echonest::EchonestClient and mock::MockCatalog.
#[async_trait::async_trait]
pub trait CatalogService: Send + Sync {
    /// Resolve the catalog id for `name`, creating the catalog when absent.
    async fn create_catalog(&self, name: &str) -> Result<String>;

    /// Read one page of items. `extended` additionally requests candidate
    /// tracks and item keyvalues; plain reads are enough for draining.
    async fn read_page(
        &self,
        catalog_id: &str,
        start: usize,
        results: usize,
        extended: bool,
    ) -> Result<CatalogPage>;

    /// Submit a batch of mutations. The returned ticket must reach complete
    /// before anything depending on the mutation runs.
    async fn bulk_update(&self, catalog_id: &str, ops: &[BulkOp]) -> Result<Ticket>;

    async fn ticket_status(&self, ticket: &Ticket) -> Result<TicketStatus>;
}

/// Playlist port. The remote only exposes remove and add primitives, no
/// replace, so rewriting contents is remove-all followed by add-in-order.
#[async_trait::async_trait]
pub trait PlaylistService: Send + Sync {
    /// Install the access token pair used to sign subsequent calls.
    async fn set_access(&self, access: AccessCredentials);

    /// Create an empty playlist and return its key.
    async fn create_playlist(&self, name: &str, description: &str) -> Result<String>;

    /// All playlists owned by the authenticated account, with track keys.
    async fn owned_playlists(&self) -> Result<Vec<PlaylistSummary>>;

    /// Remove `count` tracks starting at `index`; `tracks` names them.
    async fn remove_tracks(
        &self,
        playlist_key: &str,
        index: usize,
        count: usize,
        tracks: &[String],
    ) -> Result<()>;

    /// Append tracks in the given order.
    async fn add_tracks(&self, playlist_key: &str, tracks: &[String]) -> Result<()>;
}

/// Produces the ordered chart entries; scraping details stay behind this.
/// Implementations: chart::HtmlChartSource and mock::MockChart.
#[async_trait::async_trait]
pub trait ChartSource: Send + Sync {
    async fn fetch_entries(&self) -> Result<Vec<ChartEntry>>;
}

/// One-time interactive authorization yielding the access token pair.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn obtain_access_credentials(&self) -> Result<AccessCredentials>;
}
