use super::oauth::OauthKeys;
use super::CredentialProvider;
use crate::error::{Result, SyncError};
use crate::models::AccessCredentials;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use tracing::info;
use url::Url;

/// Manual out-of-band ("PIN") authorization:
/// 1. Fetch a request token with callback "oob".
/// 2. Print the authorize URL; the user approves in a browser and is shown a PIN.
/// 3. User pastes the PIN into this CLI.
/// 4. The request token plus PIN is exchanged for the access token pair.
///
/// The caller persists the pair into the config file so later runs skip
/// all of this. Avoids running an embedded HTTP server for the callback.
pub struct PinAuthenticator {
    client: Client,
    consumer_key: String,
    consumer_secret: String,
}

impl PinAuthenticator {
    pub fn new(consumer_key: String, consumer_secret: String) -> Self {
        Self {
            client: Client::new(),
            consumer_key,
            consumer_secret,
        }
    }

    fn oauth_base() -> String {
        std::env::var("RDIO_OAUTH_BASE").unwrap_or_else(|_| "http://api.rdio.com/oauth".into())
    }

    fn authorize_base() -> String {
        std::env::var("RDIO_AUTHORIZE_BASE")
            .unwrap_or_else(|_| "https://www.rdio.com/oauth/authorize".into())
    }

    /// One leg of the token dance. The response body is form-encoded
    /// (oauth_token=...&oauth_token_secret=...).
    async fn token_request(
        &self,
        path: &str,
        token: Option<(&str, &str)>,
        extra_oauth: &[(&str, &str)],
    ) -> Result<Vec<(String, String)>> {
        let url = format!("{}/{}", Self::oauth_base(), path);
        let mut keys = OauthKeys::new(&self.consumer_key, &self.consumer_secret);
        if let Some((tok, secret)) = token {
            keys = keys.with_token(tok, secret);
        }
        let auth = keys.authorization_header("POST", &url, &[], extra_oauth);
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SyncError::Protocol(format!(
                "{} failed: {} => {}",
                path, status, body
            )));
        }
        Ok(url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect())
    }
}

fn field<'a>(pairs: &'a [(String, String)], name: &str, path: &str) -> Result<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| SyncError::Protocol(format!("{} response missing {}", path, name)))
}

#[async_trait]
impl CredentialProvider for PinAuthenticator {
    async fn obtain_access_credentials(&self) -> Result<AccessCredentials> {
        let pairs = self
            .token_request("request_token", None, &[("oauth_callback", "oob")])
            .await?;
        let request_token = field(&pairs, "oauth_token", "request_token")?.to_string();
        let request_secret = field(&pairs, "oauth_token_secret", "request_token")?.to_string();

        let mut url = Url::parse(&Self::authorize_base())
            .map_err(|e| SyncError::Config(format!("bad authorize url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("oauth_token", &request_token);

        println!(
            "Open this URL in your browser and allow the application access:\n\n{}\n",
            url
        );
        println!("After approving you'll be shown a PIN. Paste it here.");
        println!("PIN:");
        let mut pin = String::new();
        std::io::stdin().read_line(&mut pin)?;
        let pin = pin.trim().to_string();
        if pin.is_empty() {
            return Err(SyncError::Config("no PIN provided".into()));
        }

        let pairs = self
            .token_request(
                "access_token",
                Some((&request_token, &request_secret)),
                &[("oauth_verifier", &pin)],
            )
            .await?;
        let token = field(&pairs, "oauth_token", "access_token")?.to_string();
        let token_secret = field(&pairs, "oauth_token_secret", "access_token")?.to_string();

        info!("access credentials obtained via PIN authorization");
        Ok(AccessCredentials {
            token,
            token_secret,
        })
    }
}
