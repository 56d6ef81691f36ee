use crate::error::{CasambiError, Result};
use crate::types::{IntoTargetId, NetworkId, NetworkSelection, SensorType, Session, UnitState};
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Cloud REST endpoint
pub const DEFAULT_REST_URL: &str = "https://door.casambi.com/v1";

const KEY_HEADER: &str = "x-casambi-key";
const SESSION_HEADER: &str = "x-casambi-session";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DATAPOINT_TIME_FORMAT: &str = "%Y%m%d%H%M";
const DEFAULT_DATAPOINT_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
struct UserSessionResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct NetworkSessionEntry {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Authenticates against the cloud and runs REST queries
///
/// Holds the API key and an HTTP client. Every failure is returned to the
/// caller; nothing is retried.
pub struct SessionManager {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl SessionManager {
    pub fn new(api_key: SecretString) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_REST_URL)
    }

    /// Manager talking to a different REST base URL
    pub fn with_base_url(api_key: SecretString, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(http, api_key, base_url))
    }

    /// Manager with a pre-built `reqwest::Client`
    pub fn with_client(http: reqwest::Client, api_key: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn key_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(self.api_key.expose_secret())
            .map_err(|_| CasambiError::invalid("api_key", "not usable as a header value"))?;
        headers.insert(KEY_HEADER, key);
        Ok(headers)
    }

    async fn post_credentials(&self, path: &str, email: &str, password: &str) -> Result<String> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .headers(self.key_headers()?)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != reqwest::StatusCode::OK {
            tracing::warn!("Login at {} failed with status {}", url, status);
            return Err(CasambiError::Auth {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// Create a user session, returning its id
    pub async fn authenticate_user(&self, email: &str, password: &str) -> Result<String> {
        let body = self.post_credentials("users/session/", email, password).await?;
        let response: UserSessionResponse = serde_json::from_str(&body)?;
        tracing::info!("User session created");
        Ok(response.session_id)
    }

    /// Create a network session, returning `(network_id, network_session_id)`.
    ///
    /// The server answers with one entry per network the credentials give
    /// access to; `selection` decides which one is used.
    pub async fn authenticate_network(
        &self,
        email: &str,
        network_password: &str,
        selection: &NetworkSelection,
    ) -> Result<(NetworkId, String)> {
        let body = self
            .post_credentials("networks/session/", email, network_password)
            .await?;
        let networks: IndexMap<NetworkId, NetworkSessionEntry> = serde_json::from_str(&body)?;
        select_network(networks, selection)
    }

    /// Authenticate user and network and build the [`Session`]
    pub async fn login(
        &self,
        email: &str,
        user_password: &str,
        network_password: &str,
        selection: &NetworkSelection,
    ) -> Result<Session> {
        let user_session_id = self.authenticate_user(email, user_password).await?;
        let (network_id, network_session_id) = self
            .authenticate_network(email, network_password, selection)
            .await?;
        tracing::info!("Logged in to network {}", network_id);

        Ok(Session::new(
            self.api_key.clone(),
            user_session_id,
            network_id,
            network_session_id,
        ))
    }

    async fn get(&self, session: &Session, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);

        let mut headers = self.key_headers()?;
        let session_id = HeaderValue::from_str(session.user_session_id())
            .map_err(|_| CasambiError::invalid("session", "not usable as a header value"))?;
        headers.insert(SESSION_HEADER, session_id);

        let response = self
            .http
            .get(&url)
            .headers(headers)
            .query(query)
            .send()
            .await?;

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

    fn network_path(session: &Session, rest: &str) -> String {
        if rest.is_empty() {
            format!("networks/{}", session.network_id())
        } else {
            format!("networks/{}/{}", session.network_id(), rest)
        }
    }

    pub async fn fetch_network_info(&self, session: &Session) -> Result<Value> {
        self.get(session, &Self::network_path(session, ""), &[]).await
    }

    /// Full network state, including every unit's current controls
    pub async fn fetch_network_state(&self, session: &Session) -> Result<Value> {
        self.get(session, &Self::network_path(session, "state"), &[])
            .await
    }

    pub async fn fetch_unit_state(&self, session: &Session, unit: impl IntoTargetId) -> Result<UnitState> {
        let unit = unit.into_target_id()?;
        let path = Self::network_path(session, &format!("units/{}/state", unit));
        self.get(session, &path, &[]).await.map(UnitState::from_json)
    }

    pub async fn fetch_unit_list(&self, session: &Session) -> Result<Value> {
        self.get(session, &Self::network_path(session, "units"), &[])
            .await
    }

    pub async fn fetch_scene_list(&self, session: &Session) -> Result<Value> {
        self.get(session, &Self::network_path(session, "scenes"), &[])
            .await
    }

    pub async fn fetch_fixture_info(&self, session: &Session, fixture: impl IntoTargetId) -> Result<Value> {
        let fixture = fixture.into_target_id()?;
        self.get(session, &format!("fixtures/{}", fixture), &[]).await
    }

    /// Datapoints between `from` and `to` (local time).
    ///
    /// Missing bounds default to the last seven days. `sensor_type` must be
    /// 0 or 1 and is checked before any request is made.
    pub async fn fetch_datapoints(
        &self,
        session: &Session,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
        sensor_type: u8,
    ) -> Result<Value> {
        let sensor_type = SensorType::try_from(sensor_type)?;
        let (from, to) = datapoint_window(from, to, Local::now().naive_local());

        let query = [
            ("sensorType", (sensor_type as u8).to_string()),
            ("from", from.format(DATAPOINT_TIME_FORMAT).to_string()),
            ("to", to.format(DATAPOINT_TIME_FORMAT).to_string()),
        ];
        self.get(session, &Self::network_path(session, "datapoints"), &query)
            .await
    }
}

fn select_network(
    mut networks: IndexMap<NetworkId, NetworkSessionEntry>,
    selection: &NetworkSelection,
) -> Result<(NetworkId, String)> {
    if networks.len() > 1 {
        tracing::warn!(
            "Credentials give access to {} networks, selecting by {:?}",
            networks.len(),
            selection
        );
    }

    let entry = match selection {
        NetworkSelection::First => networks.shift_remove_index(0),
        NetworkSelection::Id(id) => networks.shift_remove_entry(id),
    };

    entry
        .map(|(id, entry)| (id, entry.session_id))
        .ok_or_else(|| match selection {
            NetworkSelection::First => {
                CasambiError::Protocol("network session response lists no networks".to_string())
            }
            NetworkSelection::Id(id) => {
                CasambiError::Protocol(format!("network {} not present in session response", id))
            }
        })
}

fn datapoint_window(
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> (NaiveDateTime, NaiveDateTime) {
    let to = to.unwrap_or(now);
    let from = from.unwrap_or_else(|| now - ChronoDuration::days(DEFAULT_DATAPOINT_DAYS));
    (from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entries(ids: &[&str]) -> IndexMap<NetworkId, NetworkSessionEntry> {
        ids.iter()
            .map(|id| {
                (
                    id.to_string(),
                    NetworkSessionEntry {
                        session_id: format!("session-{}", id),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn first_network_in_response_order() {
        let selected = select_network(entries(&["zeta", "alpha"]), &NetworkSelection::First).unwrap();
        assert_eq!(selected, ("zeta".to_string(), "session-zeta".to_string()));
    }

    #[test]
    fn explicit_network_selection() {
        let selection = NetworkSelection::Id("alpha".to_string());
        let selected = select_network(entries(&["zeta", "alpha"]), &selection).unwrap();
        assert_eq!(selected.0, "alpha");

        let missing = NetworkSelection::Id("nope".to_string());
        assert!(matches!(
            select_network(entries(&["zeta"]), &missing),
            Err(CasambiError::Protocol(_))
        ));
    }

    #[test]
    fn empty_network_response_is_protocol_error() {
        assert!(matches!(
            select_network(entries(&[]), &NetworkSelection::First),
            Err(CasambiError::Protocol(_))
        ));
    }

    #[test]
    fn datapoint_window_defaults_to_last_week() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();

        let (from, to) = datapoint_window(None, None, now);
        assert_eq!(to.format(DATAPOINT_TIME_FORMAT).to_string(), "202403101405");
        assert_eq!(from.format(DATAPOINT_TIME_FORMAT).to_string(), "202403031405");
    }
}
