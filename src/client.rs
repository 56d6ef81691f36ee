use crate::channel::{ControlChannel, DEFAULT_DRAIN_TIMEOUT};
use crate::config::Config;
use crate::error::{CasambiError, Result};
use crate::protocol::InboundMessage;
use crate::rest::SessionManager;
use crate::types::{ColorTemperatureSource, IntoTargetId, Session, UnitState, WireId};
use chrono::NaiveDateTime;
use secrecy::ExposeSecret;
use serde_json::Value;

/// Client for a Casambi network
///
/// `CasambiClient` owns the REST session and the control channel for one
/// network. Create one per network when several must be controlled.
pub struct CasambiClient {
    rest: SessionManager,
    session: Session,
    channel: ControlChannel,
}

impl CasambiClient {
    /// Log in with the configured credentials and open the configured wire
    ///
    /// # Example
    ///
    /// ```no_run
    /// use casambi_cloud::{CasambiClient, Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = Config::load("casambi.yaml")?;
    ///     let mut client = CasambiClient::connect(&config).await?;
    ///     client.turn_on(1).await?;
    ///     client.close().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: &Config) -> Result<Self> {
        let rest = match &config.rest_url {
            Some(url) => SessionManager::with_base_url(config.api_key.clone(), url)?,
            None => SessionManager::new(config.api_key.clone())?,
        };

        let session = rest
            .login(
                &config.email,
                config.user_password.expose_secret(),
                config.network_password.expose_secret(),
                &config.network,
            )
            .await?;

        let channel = match &config.ws_url {
            Some(url) => ControlChannel::with_url(url),
            None => ControlChannel::new(),
        };

        let mut client = Self::from_parts(rest, session, channel);
        if !client.open(config.wire_id).await? {
            let detail = client
                .channel
                .last_open_response()
                .map(|m| m.raw_json().to_string())
                .unwrap_or_else(|| "connection closed".to_string());
            return Err(CasambiError::Protocol(format!(
                "wire {} was not opened: {}",
                config.wire_id, detail
            )));
        }
        Ok(client)
    }

    /// Assemble a client from an existing session; the wire is not opened
    pub fn from_parts(rest: SessionManager, session: Session, channel: ControlChannel) -> Self {
        Self {
            rest,
            session,
            channel,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn rest(&self) -> &SessionManager {
        &self.rest
    }

    pub fn channel(&mut self) -> &mut ControlChannel {
        &mut self.channel
    }

    /// Open (or reopen) a wire, see [`ControlChannel::open`]
    pub async fn open(&mut self, wire: WireId) -> Result<bool> {
        self.channel.open(&self.session, wire).await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.channel.close().await
    }

    // REST queries

    pub async fn network_info(&self) -> Result<Value> {
        self.rest.fetch_network_info(&self.session).await
    }

    pub async fn network_state(&self) -> Result<Value> {
        self.rest.fetch_network_state(&self.session).await
    }

    pub async fn unit_state(&self, unit: impl IntoTargetId) -> Result<UnitState> {
        self.rest.fetch_unit_state(&self.session, unit).await
    }

    pub async fn unit_list(&self) -> Result<Value> {
        self.rest.fetch_unit_list(&self.session).await
    }

    pub async fn scene_list(&self) -> Result<Value> {
        self.rest.fetch_scene_list(&self.session).await
    }

    pub async fn fixture_info(&self, fixture: impl IntoTargetId) -> Result<Value> {
        self.rest.fetch_fixture_info(&self.session, fixture).await
    }

    pub async fn datapoints(
        &self,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
        sensor_type: u8,
    ) -> Result<Value> {
        self.rest
            .fetch_datapoints(&self.session, from, to, sensor_type)
            .await
    }

    // Capabilities

    pub async fn unit_supports_rgb(&self, unit: impl IntoTargetId) -> Result<bool> {
        Ok(self.unit_state(unit).await?.supports_rgb())
    }

    pub async fn unit_supports_rgbw(&self, unit: impl IntoTargetId) -> Result<bool> {
        Ok(self.unit_state(unit).await?.supports_rgbw())
    }

    pub async fn unit_supports_color_temperature(&self, unit: impl IntoTargetId) -> Result<bool> {
        Ok(self.unit_state(unit).await?.supports_color_temperature())
    }

    pub async fn supported_color_temperature_range(&self, unit: impl IntoTargetId) -> Result<(u32, u32)> {
        Ok(self.unit_state(unit).await?.supported_color_temperature_range())
    }

    // Control

    pub async fn turn_on(&mut self, unit: impl IntoTargetId) -> Result<()> {
        self.channel.turn_on(unit).await
    }

    pub async fn turn_off(&mut self, unit: impl IntoTargetId) -> Result<()> {
        self.channel.turn_off(unit).await
    }

    pub async fn set_dimmer(&mut self, unit: impl IntoTargetId, value: f64) -> Result<()> {
        self.channel.set_dimmer(unit, value).await
    }

    pub async fn set_rgb(&mut self, unit: impl IntoTargetId, rgb: (u8, u8, u8), raw_rgb_string: bool) -> Result<()> {
        self.channel.set_rgb(unit, rgb, raw_rgb_string).await
    }

    pub async fn set_rgbw(&mut self, unit: impl IntoTargetId, rgbw: (u8, u8, u8, u8)) -> Result<()> {
        self.channel.set_rgbw(unit, rgbw).await
    }

    /// Set the color temperature, clamped into the range the unit reports
    ///
    /// Returns the kelvin value that was sent.
    pub async fn set_color_temperature(
        &mut self,
        unit: impl IntoTargetId,
        value: u32,
        source: ColorTemperatureSource,
    ) -> Result<u32> {
        let unit = unit.into_target_id()?;
        if !self.channel.is_open() {
            return Err(CasambiError::NotConnected);
        }
        let range = self.supported_color_temperature_range(unit).await?;
        self.channel
            .set_color_temperature(unit, value, source, range)
            .await
    }

    pub async fn turn_scene_on(&mut self, scene: impl IntoTargetId) -> Result<()> {
        self.channel.control_scene(scene, true).await
    }

    pub async fn turn_scene_off(&mut self, scene: impl IntoTargetId) -> Result<()> {
        self.channel.control_scene(scene, false).await
    }

    // Inbound

    pub async fn receive_one(&mut self) -> Result<InboundMessage> {
        self.channel.receive_one().await
    }

    /// Drain pending inbound frames with the default 100 ms read timeout
    pub async fn drain(&mut self) -> Result<Vec<InboundMessage>> {
        self.channel.drain_nonblocking(DEFAULT_DRAIN_TIMEOUT).await
    }
}
