use crate::error::{CasambiError, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Endpoint used by the Casambi apps themselves
pub const DEFAULT_PRIVATE_API_URL: &str = "https://api.casambi.com";

/// Device name reported on login unless overridden
pub const DEFAULT_DEVICE_NAME: &str = "casambi-cloud";

const SESSION_HEADER: &str = "x-casambi-session";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const FORMAT_VERSION: u32 = 1;
const DEFAULT_ROLE: u32 = 3;

fn default_role() -> u32 {
    DEFAULT_ROLE
}

/// Session granted by a network password login on the app API
#[derive(Debug, Clone, Deserialize)]
pub struct PrivateSession {
    session: String,
    network: String,
    manager: bool,
    #[serde(rename = "keyID")]
    key_id: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    expires: DateTime<Utc>,
    #[serde(default = "default_role")]
    role: u32,
}

impl PrivateSession {
    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn manager(&self) -> bool {
        self.manager
    }

    pub fn key_id(&self) -> i64 {
        self.key_id
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    pub fn role(&self) -> u32 {
        self.role
    }

    pub fn expired(&self) -> bool {
        self.expired_at(Utc::now())
    }

    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires
    }
}

/// Client for the app-facing API at `api.casambi.com`
///
/// Needs no API key. Networks are looked up by UUID or bridge MAC address,
/// and a network password login yields a [`PrivateSession`] that is valid
/// until its `expires` timestamp.
pub struct PrivateApi {
    http: reqwest::Client,
    base_url: String,
    device_name: String,
    session: Option<PrivateSession>,
}

impl PrivateApi {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_PRIVATE_API_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            session: None,
        }
    }

    /// Report a different device name on login and network queries
    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = device_name.into();
        self
    }

    pub fn session(&self) -> Option<&PrivateSession> {
        self.session.as_ref()
    }

    /// Whether a session exists and has not expired
    pub fn is_authenticated(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.expired())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Log in to `network_id` with its network password
    pub async fn login(&mut self, network_id: &str, password: &SecretString) -> Result<&PrivateSession> {
        let url = self.url(&format!("network/{}/session", network_id));
        tracing::debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&json!({
                "password": password.expose_secret(),
                "deviceName": self.device_name,
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != reqwest::StatusCode::OK {
            tracing::warn!("Login to network {} failed with status {}", network_id, status);
            return Err(CasambiError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let session: PrivateSession = serde_json::from_str(&body)?;
        tracing::info!("Private session for network {} valid until {}", session.network, session.expires);
        Ok(&*self.session.insert(session))
    }

    /// Network description looked up by UUID or bridge MAC address
    pub async fn network_information_from_uuid(&self, uuid: &str) -> Result<Value> {
        let url = self.url(&format!("network/uuid/{}", normalize_network_uuid(uuid)));
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .send()
            .await?;
        read_json(response).await
    }

    /// Network id for a UUID or MAC, `None` when the answer carries no id
    pub async fn network_id_from_uuid(&self, uuid: &str) -> Result<Option<String>> {
        let info = self.network_information_from_uuid(uuid).await?;
        Ok(info.get("id").and_then(Value::as_str).map(str::to_string))
    }

    /// Full network document; requires an unexpired session
    pub async fn network_information(&self, network_id: &str) -> Result<Value> {
        let session = self
            .session
            .as_ref()
            .filter(|s| !s.expired())
            .ok_or(CasambiError::NotAuthenticated)?;

        let url = self.url(&format!("network/{}/", network_id));
        tracing::debug!("GET {}", url);

        let mut headers = HeaderMap::new();
        let session_id = HeaderValue::from_str(&session.session)
            .map_err(|_| CasambiError::invalid("session", "not usable as a header value"))?;
        headers.insert(SESSION_HEADER, session_id);

        let response = self
            .http
            .get(&url)
            .headers(headers)
            .json(&json!({
                "formatVersion": FORMAT_VERSION,
                "deviceName": self.device_name,
            }))
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;
    if status != reqwest::StatusCode::OK {
        return Err(CasambiError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

/// Strip separators from a MAC address (`aa:bb:cc:dd:ee:ff` or with `-`).
///
/// Anything that is not a MAC address is returned unchanged.
pub fn normalize_network_uuid(uuid: &str) -> String {
    let is_mac = uuid.len() == 17
        && uuid.bytes().enumerate().all(|(i, b)| {
            if i % 3 == 2 {
                b == b':' || b == b'-'
            } else {
                b.is_ascii_hexdigit()
            }
        });

    if is_mac {
        uuid.chars().filter(|c| *c != ':' && *c != '-').collect()
    } else {
        uuid.to_string()
    }
}
