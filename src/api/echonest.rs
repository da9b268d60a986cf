use super::budget::RateBudget;
use super::CatalogService;
use crate::error::{Result, SyncError};
use crate::models::{BulkOp, CatalogPage, Ticket, TicketStatus};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::Deserialize;
use std::env;

/// Every response comes wrapped in `{"response": {"status": {...}, ...}}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    /// On a duplicate-name create the existing catalog id shows up here.
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    status: ApiStatus,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    status: ApiStatus,
    /// Absent when the envelope carries an error code.
    #[serde(default)]
    catalog: Option<CatalogPage>,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    status: ApiStatus,
    #[serde(default)]
    ticket: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: ApiStatus,
    #[serde(default)]
    ticket_status: Option<String>,
}

/// Taste-profile catalog client. Every call, reads and status polls
/// included, costs one unit of the shared per-minute budget, so all
/// requests go through `RateBudget` first.
/// The endpoint may be overridden by the ECHONEST_API_BASE env var
/// (useful for tests).
pub struct EchonestClient {
    client: Client,
    api_key: String,
    region: String,
    budget: RateBudget,
}

impl EchonestClient {
    pub fn new(api_key: String, region: String, rate_limit_per_minute: u32) -> Self {
        Self {
            client: Client::new(),
            api_key,
            region,
            budget: RateBudget::per_minute(rate_limit_per_minute),
        }
    }

    fn api_base() -> String {
        env::var("ECHONEST_API_BASE")
            .unwrap_or_else(|_| "http://developer.echonest.com/api/v4".into())
    }

    async fn get_json<T>(&self, path: &str, params: &[(String, String)]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.budget.acquire().await;
        let url = format!("{}/{}", Self::api_base(), path);
        let resp = self.client.get(&url).query(params).send().await?;
        Self::decode(path, resp).await
    }

    async fn post_form<T>(&self, path: &str, form: &[(String, String)]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.budget.acquire().await;
        let url = format!("{}/{}", Self::api_base(), path);
        let resp = self.client.post(&url).form(form).send().await?;
        Self::decode(path, resp).await
    }

    async fn decode<T>(path: &str, resp: reqwest::Response) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(SyncError::RateLimit { retry_after });
        }
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            let msg = format!("{} failed: {} => {}", path, status, txt);
            // server-side hiccups may clear up, client errors won't
            return Err(if status.is_server_error() {
                SyncError::Http(msg)
            } else {
                SyncError::Protocol(msg)
            });
        }
        let body = resp.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            SyncError::Protocol(format!("{}: unparseable response: {} => {}", path, e, body))
        })?;
        Ok(envelope.response)
    }

    /// Non-zero envelope codes mean the call failed even though HTTP said
    /// 200; in-flight work must be treated as failed.
    fn ensure_ok(path: &str, status: &ApiStatus) -> Result<()> {
        if status.code != 0 {
            let message = status.message.clone().unwrap_or_default();
            error!("{} returned status code {}: {}", path, status.code, message);
            return Err(SyncError::Protocol(format!(
                "{} status code {}: {}",
                path, status.code, message
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogService for EchonestClient {
    async fn create_catalog(&self, name: &str) -> Result<String> {
        let form = [
            ("api_key".to_string(), self.api_key.clone()),
            ("type".to_string(), "song".to_string()),
            ("name".to_string(), name.to_string()),
        ];
        let resp: CreateResponse = self.post_form("tasteprofile/create", &form).await?;
        // code 5 means the name is taken; the existing id rides along
        if resp.status.code == 5 {
            if let Some(id) = resp.status.id {
                debug!("catalog '{}' already exists as {}", name, id);
                return Ok(id);
            }
        }
        Self::ensure_ok("tasteprofile/create", &resp.status)?;
        resp.id.ok_or_else(|| {
            SyncError::Protocol("tasteprofile/create returned no catalog id".into())
        })
    }

    async fn read_page(
        &self,
        catalog_id: &str,
        start: usize,
        results: usize,
        extended: bool,
    ) -> Result<CatalogPage> {
        let mut params = vec![
            ("api_key".to_string(), self.api_key.clone()),
            ("id".to_string(), catalog_id.to_string()),
            ("start".to_string(), start.to_string()),
            ("results".to_string(), results.to_string()),
        ];
        if extended {
            params.push(("bucket".to_string(), format!("id:rdio-{}", self.region)));
            params.push(("bucket".to_string(), "tracks".to_string()));
            params.push(("bucket".to_string(), "item_keyvalues".to_string()));
        }
        let resp: ReadResponse = self.get_json("tasteprofile/read", &params).await?;
        Self::ensure_ok("tasteprofile/read", &resp.status)?;
        resp.catalog
            .ok_or_else(|| SyncError::Protocol("tasteprofile/read returned no catalog".into()))
    }

    async fn bulk_update(&self, catalog_id: &str, ops: &[BulkOp]) -> Result<Ticket> {
        let data = serde_json::to_string(ops)?;
        let form = [
            ("api_key".to_string(), self.api_key.clone()),
            ("id".to_string(), catalog_id.to_string()),
            ("data".to_string(), data),
        ];
        let resp: UpdateResponse = self.post_form("tasteprofile/update", &form).await?;
        Self::ensure_ok("tasteprofile/update", &resp.status)?;
        let ticket = resp
            .ticket
            .ok_or_else(|| SyncError::Protocol("tasteprofile/update returned no ticket".into()))?;
        debug!("bulk update of {} op(s) accepted, ticket {}", ops.len(), ticket);
        Ok(Ticket(ticket))
    }

    async fn ticket_status(&self, ticket: &Ticket) -> Result<TicketStatus> {
        let params = vec![
            ("api_key".to_string(), self.api_key.clone()),
            ("ticket".to_string(), ticket.0.clone()),
        ];
        let resp: StatusResponse = self.get_json("tasteprofile/status", &params).await?;
        Self::ensure_ok("tasteprofile/status", &resp.status)?;
        let raw = resp.ticket_status.ok_or_else(|| {
            SyncError::Protocol("tasteprofile/status returned no ticket_status".into())
        })?;
        Ok(TicketStatus::parse(&raw))
    }
}
