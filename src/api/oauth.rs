use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// OAuth 1.0a signer: consumer identity plus the optional token pair.
/// Builds `Authorization: OAuth ...` header values for form POSTs.
#[derive(Debug, Clone)]
pub struct OauthKeys {
    consumer_key: String,
    consumer_secret: String,
    token: Option<String>,
    token_secret: Option<String>,
}

/// Percent-encoding with the RFC 3986 unreserved set, the one OAuth
/// signatures require.
pub fn percent_encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Signature base string: method, base URL and the normalized request
/// parameters, each percent-encoded and joined with `&`.
fn base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

fn nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

impl OauthKeys {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: None,
            token_secret: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, token_secret: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self.token_secret = Some(token_secret.into());
        self
    }

    fn signing_key(&self) -> String {
        format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(self.token_secret.as_deref().unwrap_or(""))
        )
    }

    /// Header value for a form POST with the given body parameters.
    /// `extra_oauth` carries flow parameters such as oauth_callback or
    /// oauth_verifier; they are signed like everything else.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        form: &[(&str, &str)],
        extra_oauth: &[(&str, &str)],
    ) -> String {
        let mut oauth_params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer_key.clone()),
            ("oauth_nonce".into(), nonce()),
            ("oauth_signature_method".into(), "HMAC-SHA1".into()),
            ("oauth_timestamp".into(), timestamp()),
            ("oauth_version".into(), "1.0".into()),
        ];
        if let Some(token) = &self.token {
            oauth_params.push(("oauth_token".into(), token.clone()));
        }
        for (k, v) in extra_oauth {
            oauth_params.push(((*k).into(), (*v).into()));
        }

        let mut all = oauth_params.clone();
        all.extend(form.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));

        let base = base_string(method, url, &all);
        let mut mac = HmacSha1::new_from_slice(self.signing_key().as_bytes())
            .expect("hmac accepts any key length");
        mac.update(base.as_bytes());
        let signature = general_purpose::STANDARD.encode(mac.finalize().into_bytes());
        oauth_params.push(("oauth_signature".into(), signature));

        let fields = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {}", fields)
    }
}
