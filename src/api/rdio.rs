use super::oauth::OauthKeys;
use super::PlaylistService;
use crate::error::{Result, SyncError};
use crate::models::{AccessCredentials, PlaylistSummary};
use async_trait::async_trait;
use log::debug;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::Value;
use std::env;

/// Web-service client. Every call is an OAuth-signed form POST against a
/// single endpoint with the method name as a form field. The access token
/// pair is installed once the interactive flow (or the config) provides it.
/// The endpoint may be overridden by the RDIO_API_BASE env var (useful for
/// tests).
pub struct RdioClient {
    client: Client,
    consumer_key: String,
    consumer_secret: String,
    access: tokio::sync::Mutex<Option<AccessCredentials>>,
}

impl RdioClient {
    pub fn new(consumer_key: String, consumer_secret: String) -> Self {
        Self {
            client: Client::new(),
            consumer_key,
            consumer_secret,
            access: tokio::sync::Mutex::new(None),
        }
    }

    fn api_base() -> String {
        env::var("RDIO_API_BASE").unwrap_or_else(|_| "http://api.rdio.com/1/".into())
    }

    async fn keys(&self) -> Result<OauthKeys> {
        let guard = self.access.lock().await;
        let access = guard.as_ref().ok_or_else(|| {
            SyncError::Config("no access credentials; run the auth flow first".into())
        })?;
        Ok(OauthKeys::new(&self.consumer_key, &self.consumer_secret)
            .with_token(&access.token, &access.token_secret))
    }

    /// POST one API method and return its `result` payload.
    async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value> {
        let keys = self.keys().await?;
        let url = Self::api_base();
        let mut form: Vec<(&str, &str)> = vec![("method", method)];
        form.extend_from_slice(params);
        let auth = keys.authorization_header("POST", &url, &form, &[]);
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth)
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(10);
            return Err(SyncError::RateLimit { retry_after });
        }
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let msg = format!("{} failed: {} => {}", method, status, body);
            return Err(if status.is_server_error() {
                SyncError::Http(msg)
            } else {
                SyncError::Protocol(msg)
            });
        }
        let j: Value = serde_json::from_str(&body).map_err(|e| {
            SyncError::Protocol(format!("{}: unparseable response: {} => {}", method, e, body))
        })?;
        if j["status"] != "ok" {
            let message = j["message"].as_str().unwrap_or(body.as_str());
            return Err(SyncError::Protocol(format!(
                "{} returned error: {}",
                method, message
            )));
        }
        Ok(j["result"].clone())
    }
}

#[async_trait]
impl PlaylistService for RdioClient {
    async fn set_access(&self, access: AccessCredentials) {
        let mut guard = self.access.lock().await;
        *guard = Some(access);
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        let result = self
            .call(
                "createPlaylist",
                &[("name", name), ("description", description), ("tracks", "")],
            )
            .await?;
        let key = result["key"]
            .as_str()
            .ok_or_else(|| SyncError::Protocol("createPlaylist returned no key".into()))?;
        debug!("created playlist '{}' with key {}", name, key);
        Ok(key.to_string())
    }

    async fn owned_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let result = self.call("getPlaylists", &[("extras", "trackKeys")]).await?;
        let owned = result.get("owned").cloned().unwrap_or(Value::Array(vec![]));
        serde_json::from_value(owned)
            .map_err(|e| SyncError::Protocol(format!("getPlaylists: bad owned list: {}", e)))
    }

    async fn remove_tracks(
        &self,
        playlist_key: &str,
        index: usize,
        count: usize,
        tracks: &[String],
    ) -> Result<()> {
        // index travels as a string; the endpoint rejects a bare numeric 0
        let index = index.to_string();
        let count = count.to_string();
        let tracks = tracks.join(",");
        self.call(
            "removeFromPlaylist",
            &[
                ("playlist", playlist_key),
                ("index", &index),
                ("count", &count),
                ("tracks", &tracks),
            ],
        )
        .await?;
        Ok(())
    }

    async fn add_tracks(&self, playlist_key: &str, tracks: &[String]) -> Result<()> {
        let tracks = tracks.join(",");
        self.call(
            "addToPlaylist",
            &[("playlist", playlist_key), ("tracks", &tracks)],
        )
        .await?;
        Ok(())
    }
}
