use crate::color;
use crate::error::{CasambiError, Result};
use crate::protocol::{ControlMessage, ControlPayload, InboundMessage, Method};
use crate::types::{ColorTemperatureSource, IntoTargetId, Session, TargetId, WireId, DEFAULT_WIRE};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Cloud WebSocket endpoint
pub const DEFAULT_WS_URL: &str = "wss://door.casambi.com/v1/bridge/";

/// Per-read timeout used by [`ControlChannel::drain_nonblocking`] callers
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of the wire carried by a [`ControlChannel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireState {
    Closed,
    Opening,
    Open,
}

struct Transport {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

/// WebSocket control channel for one wire
///
/// One instance owns one physical connection. Every operation except
/// [`open`](Self::open) is rejected with `NotConnected` unless the wire is
/// open.
pub struct ControlChannel {
    url: String,
    wire: WireId,
    state: WireState,
    transport: Option<Transport>,
    last_open_response: Option<InboundMessage>,
}

impl ControlChannel {
    pub fn new() -> Self {
        Self::with_url(DEFAULT_WS_URL)
    }

    /// Channel against a different bridge endpoint
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wire: DEFAULT_WIRE,
            state: WireState::Closed,
            transport: None,
            last_open_response: None,
        }
    }

    pub fn state(&self) -> WireState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == WireState::Open
    }

    pub fn wire(&self) -> WireId {
        self.wire
    }

    /// The frame that answered the most recent open attempt
    pub fn last_open_response(&self) -> Option<&InboundMessage> {
        self.last_open_response.as_ref()
    }

    /// Open `wire` for the session's network.
    ///
    /// Returns `Ok(false)` when the server answers with anything other than
    /// an open acknowledgment; transport failures are errors.
    pub async fn open(&mut self, session: &Session, wire: WireId) -> Result<bool> {
        if self.transport.is_some() {
            tracing::info!("Reopening control channel on wire {}", wire);
            self.shutdown().await;
        }

        self.wire = wire;
        self.state = WireState::Opening;
        self.last_open_response = None;

        match self.handshake(session).await {
            Ok(true) => {
                tracing::info!("Wire {} open on network {}", wire, session.network_id());
                self.state = WireState::Open;
                Ok(true)
            }
            Ok(false) => {
                self.shutdown().await;
                Ok(false)
            }
            Err(e) => {
                self.shutdown().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self, session: &Session) -> Result<bool> {
        tracing::info!("Connecting to {}", self.url);

        let mut request = self.url.as_str().into_client_request()?;
        let protocol = HeaderValue::from_str(session.api_key())
            .map_err(|_| CasambiError::invalid("api_key", "not usable as a WebSocket subprotocol"))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);

        let (ws_stream, _) = connect_async(request).await?;
        let (write, read) = ws_stream.split();
        self.transport = Some(Transport { write, read });

        let open = ControlMessage::open(self.wire, session.network_id(), session.user_session_id());
        self.send_frame(&open).await?;

        let reply = match timeout(OPEN_TIMEOUT, self.next_frame()).await {
            Ok(reply) => reply?,
            Err(_) => return Err(CasambiError::Timeout),
        };

        let Some(reply) = reply else {
            tracing::warn!("Connection closed before wire {} was acknowledged", self.wire);
            return Ok(false);
        };

        let acknowledged = reply.acknowledges_open(self.wire);
        if !acknowledged {
            tracing::warn!("Failed to open wire {}: {}", self.wire, reply.raw_json());
        }
        self.last_open_response = Some(reply);
        Ok(acknowledged)
    }

    /// Send a control frame without waiting for a reply
    ///
    /// Only `ControlUnit` and `ControlScene` are accepted; the wire is
    /// opened and closed through [`open`](Self::open) and [`close`](Self::close).
    pub async fn send_control(
        &mut self,
        method: Method,
        target: impl IntoTargetId,
        payload: ControlPayload,
    ) -> Result<()> {
        if !matches!(method, Method::ControlUnit | Method::ControlScene) {
            return Err(CasambiError::invalid(
                "method",
                format!("{:?} is not a control method", method),
            ));
        }
        let target = target.into_target_id()?;
        self.ensure_open()?;
        let message = ControlMessage::control(self.wire, method, target, payload);
        self.send_frame(&message).await
    }

    async fn control_unit(&mut self, unit: TargetId, controls: Map<String, Value>) -> Result<()> {
        self.send_control(Method::ControlUnit, unit, ControlPayload::TargetControls(controls))
            .await
    }

    /// Set the dimmer level, `value` in `[0, 1]`
    pub async fn set_dimmer(&mut self, unit: impl IntoTargetId, value: f64) -> Result<()> {
        let unit = unit.into_target_id()?;
        let value = unit_interval("value", value)?;
        self.control_unit(unit, controls([("Dimmer", json!({ "value": value }))]))
            .await
    }

    pub async fn turn_on(&mut self, unit: impl IntoTargetId) -> Result<()> {
        self.set_dimmer(unit, 1.0).await
    }

    pub async fn turn_off(&mut self, unit: impl IntoTargetId) -> Result<()> {
        self.set_dimmer(unit, 0.0).await
    }

    /// Set an RGB color.
    ///
    /// With `raw_rgb_string` the color is sent as `rgb(r, g, b)`, otherwise
    /// as hue and saturation.
    pub async fn set_rgb(
        &mut self,
        unit: impl IntoTargetId,
        (red, green, blue): (u8, u8, u8),
        raw_rgb_string: bool,
    ) -> Result<()> {
        let unit = unit.into_target_id()?;
        let color = if raw_rgb_string {
            json!({ "rgb": format!("rgb({}, {}, {})", red, green, blue) })
        } else {
            let (hue, sat) = color::rgb_to_hue_sat(red, green, blue);
            json!({ "hue": hue, "sat": sat })
        };

        self.control_unit(
            unit,
            controls([("Color", color), ("Colorsource", json!({ "source": "RGB" }))]),
        )
        .await
    }

    /// Set an RGB color plus the separate white channel
    pub async fn set_rgbw(
        &mut self,
        unit: impl IntoTargetId,
        (red, green, blue, white): (u8, u8, u8, u8),
    ) -> Result<()> {
        let unit = unit.into_target_id()?;
        let (hue, sat) = color::rgb_to_hue_sat(red, green, blue);
        let white = f64::from(white) / 255.0;

        self.control_unit(
            unit,
            controls([
                ("Color", json!({ "hue": hue, "sat": sat })),
                ("White", json!({ "value": white })),
                ("Colorsource", json!({ "source": "RGB" })),
            ]),
        )
        .await
    }

    /// Set the color temperature, clamped into the unit's `range`
    ///
    /// Returns the kelvin value that was sent.
    pub async fn set_color_temperature(
        &mut self,
        unit: impl IntoTargetId,
        value: u32,
        source: ColorTemperatureSource,
        range: (u32, u32),
    ) -> Result<u32> {
        let unit = unit.into_target_id()?;
        let kelvin = color::resolve_color_temperature(value, source, range)?;
        tracing::debug!("Color temperature for unit {}: {} -> {} K", unit, value, kelvin);

        self.control_unit(
            unit,
            controls([
                ("ColorTemperature", json!({ "value": kelvin })),
                ("Colorsource", json!({ "source": "TW" })),
            ]),
        )
        .await?;
        Ok(kelvin)
    }

    /// Turn a scene fully on or off
    pub async fn control_scene(&mut self, scene: impl IntoTargetId, on: bool) -> Result<()> {
        self.set_scene_level(scene, if on { 1.0 } else { 0.0 }).await
    }

    pub async fn set_scene_level(&mut self, scene: impl IntoTargetId, level: f64) -> Result<()> {
        let scene = scene.into_target_id()?;
        let level = unit_interval("level", level)?;
        self.send_control(Method::ControlScene, scene, ControlPayload::Level(level))
            .await
    }

    /// Wait for exactly one inbound frame
    pub async fn receive_one(&mut self) -> Result<InboundMessage> {
        self.ensure_open()?;
        match self.next_frame().await? {
            Some(message) => Ok(message),
            None => Err(CasambiError::NotConnected),
        }
    }

    /// Collect inbound frames until a read times out or the socket closes.
    ///
    /// Each read waits at most `read_timeout`; an idle channel yields an
    /// empty vector. The channel stays usable afterwards unless the socket
    /// went away. A socket error ends the drain like a close when frames
    /// were already collected, and is returned only when nothing was.
    pub async fn drain_nonblocking(&mut self, read_timeout: Duration) -> Result<Vec<InboundMessage>> {
        self.ensure_open()?;

        let mut messages = Vec::new();
        loop {
            match timeout(read_timeout, self.next_frame()).await {
                Ok(Ok(Some(message))) => messages.push(message),
                Ok(Ok(None)) | Err(_) => break,
                Ok(Err(e)) if messages.is_empty() => return Err(e),
                Ok(Err(e)) => {
                    tracing::warn!(
                        "Wire {} dropped after {} message(s): {}",
                        self.wire,
                        messages.len(),
                        e
                    );
                    break;
                }
            }
        }

        tracing::debug!("Drained {} message(s) from wire {}", messages.len(), self.wire);
        Ok(messages)
    }

    /// Send the close frame for the wire and drop the connection.
    ///
    /// No reply is awaited.
    pub async fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        let message = ControlMessage::close(self.wire);
        let sent = self.send_frame(&message).await;
        tracing::info!("Closing wire {}", self.wire);
        self.shutdown().await;
        sent
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == WireState::Open && self.transport.is_some() {
            Ok(())
        } else {
            Err(CasambiError::NotConnected)
        }
    }

    async fn send_frame(&mut self, message: &ControlMessage) -> Result<()> {
        let json = message.to_json()?;
        let transport = self.transport.as_mut().ok_or(CasambiError::NotConnected)?;
        tracing::debug!("Sending: {}", json);

        if let Err(e) = transport.write.send(Message::Text(json)).await {
            tracing::error!("Failed to send message: {}", e);
            self.mark_closed();
            return Err(e.into());
        }
        Ok(())
    }

    /// Next text frame, or `None` once the remote side has closed
    async fn next_frame(&mut self) -> Result<Option<InboundMessage>> {
        let transport = self.transport.as_mut().ok_or(CasambiError::NotConnected)?;

        loop {
            match transport.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("Received: {}", text);
                    return Ok(Some(InboundMessage::from_text(&text)));
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("WebSocket connection closed");
                    self.mark_closed();
                    return Ok(None);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("WebSocket error: {}", e);
                    self.mark_closed();
                    return Err(e.into());
                }
            }
        }
    }

    fn mark_closed(&mut self) {
        self.state = WireState::Closed;
        self.transport = None;
    }

    async fn shutdown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.write.close().await;
        }
        self.state = WireState::Closed;
    }
}

impl Default for ControlChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn unit_interval(argument: &'static str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(CasambiError::invalid(
            argument,
            format!("{} is outside [0, 1]", value),
        ))
    }
}

fn controls<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(name, state)| (name.to_string(), state))
        .collect()
}
