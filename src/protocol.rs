use crate::error::Result;
use crate::types::{NetworkId, TargetId, WireId};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Client type tag sent when opening a wire (1 = frontend)
const CLIENT_TYPE_FRONTEND: u8 = 1;

/// Control channel methods
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    Open,
    Close,
    ControlUnit,
    ControlScene,
}

/// Identifier carried in the `id` field of a frame
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FrameId {
    Network(NetworkId),
    Target(TargetId),
}

/// Method-specific body of a control frame
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum ControlPayload {
    /// Unit controls, keyed by control name (`Dimmer`, `Color`, ...)
    #[serde(rename = "targetControls")]
    TargetControls(Map<String, Value>),
    /// Scene level in `[0, 1]`
    #[serde(rename = "level")]
    Level(f64),
}

/// One outbound JSON frame
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ControlMessage {
    pub wire: WireId,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<FrameId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub client_type: Option<u8>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ControlPayload>,
}

impl ControlMessage {
    fn new(wire: WireId, method: Method) -> Self {
        Self {
            wire,
            method,
            id: None,
            session: None,
            reference: None,
            client_type: None,
            payload: None,
        }
    }

    /// Frame that opens `wire` for `network_id`, with a fresh reference
    pub fn open(wire: WireId, network_id: impl Into<NetworkId>, session: impl Into<String>) -> Self {
        let mut message = Self::new(wire, Method::Open);
        message.id = Some(FrameId::Network(network_id.into()));
        message.session = Some(session.into());
        message.reference = Some(Uuid::new_v4().to_string());
        message.client_type = Some(CLIENT_TYPE_FRONTEND);
        message
    }

    pub fn close(wire: WireId) -> Self {
        Self::new(wire, Method::Close)
    }

    pub fn control_unit(wire: WireId, unit: TargetId, controls: Map<String, Value>) -> Self {
        Self::control(wire, Method::ControlUnit, unit, ControlPayload::TargetControls(controls))
    }

    pub fn control_scene(wire: WireId, scene: TargetId, level: f64) -> Self {
        Self::control(wire, Method::ControlScene, scene, ControlPayload::Level(level))
    }

    /// Frame for an arbitrary control method and payload
    pub fn control(wire: WireId, method: Method, target: TargetId, payload: ControlPayload) -> Self {
        let mut message = Self::new(wire, method);
        message.id = Some(FrameId::Target(target));
        message.payload = Some(payload);
        message
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Wire status values reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireStatus {
    OpenWireSucceed,
    /// Given API key was invalid
    KeyAuthenticateFailed,
    /// Key is not authorized or has no WebSocket access
    KeyAuthorizeFailed,
    /// Session is invalid or has no access to the network
    InvalidSession,
    /// A value had the wrong type
    InvalidValueType,
    /// Data could not be processed
    InvalidData,
    Unknown(String),
}

impl WireStatus {
    fn parse(status: &str) -> Self {
        match status {
            "openWireSucceed" => Self::OpenWireSucceed,
            "keyAuthenticateFailed" => Self::KeyAuthenticateFailed,
            "keyAuthorizeFailed" => Self::KeyAuthorizeFailed,
            "invalidSession" => Self::InvalidSession,
            "invalidValueType" => Self::InvalidValueType,
            "invalidData" => Self::InvalidData,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Recognized shapes of inbound frames
#[derive(Debug, Clone, PartialEq)]
pub enum InboundKind {
    WireStatus(WireStatus),
    PeerChanged { wire: Option<WireId>, online: bool },
    UnitChanged { wire: Option<WireId>, unit: Option<u64> },
    Other,
}

/// Inbound frame, kept as the raw JSON the server sent
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    raw: Value,
}

impl InboundMessage {
    pub fn from_json(raw: Value) -> Self {
        Self { raw }
    }

    /// Wrap a text frame; text that is not JSON is kept as a JSON string
    pub fn from_text(text: &str) -> Self {
        let raw = serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));
        Self { raw }
    }

    pub fn raw_json(&self) -> &Value {
        &self.raw
    }

    pub fn into_json(self) -> Value {
        self.raw
    }

    pub fn wire(&self) -> Option<WireId> {
        self.raw
            .get("wire")
            .and_then(Value::as_u64)
            .and_then(|w| WireId::try_from(w).ok())
    }

    pub fn kind(&self) -> InboundKind {
        if let Some(status) = self.raw.get("wireStatus").and_then(Value::as_str) {
            return InboundKind::WireStatus(WireStatus::parse(status));
        }

        match self.raw.get("method").and_then(Value::as_str) {
            Some("peerChanged") => InboundKind::PeerChanged {
                wire: self.wire(),
                online: self.raw.get("online").and_then(Value::as_bool).unwrap_or(false),
            },
            Some("unitChanged") => InboundKind::UnitChanged {
                wire: self.wire(),
                unit: self.raw.get("id").and_then(Value::as_u64),
            },
            _ => InboundKind::Other,
        }
    }

    /// Whether this frame acknowledges opening `wire`.
    ///
    /// The server answers an open either with an explicit wire status or
    /// with a peer-changed event for the same wire.
    pub fn acknowledges_open(&self, wire: WireId) -> bool {
        match self.kind() {
            InboundKind::WireStatus(WireStatus::OpenWireSucceed) => true,
            InboundKind::PeerChanged {
                wire: Some(w),
                online: true,
            } => w == wire,
            _ => false,
        }
    }
}
