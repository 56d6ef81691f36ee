use crate::error::{CasambiError, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Network identifier as issued by the cloud
pub type NetworkId = String;

/// Wire identifier (logical conversation on the control channel)
pub type WireId = u32;

/// Wire used when the caller does not pick one
pub const DEFAULT_WIRE: WireId = 1;

/// Authenticated credential bundle
///
/// Produced by [`SessionManager::login`](crate::SessionManager::login) and
/// never mutated afterwards. The API key is kept as a secret and only
/// exposed when a request header is built.
#[derive(Debug, Clone)]
pub struct Session {
    user_session_id: String,
    network_id: NetworkId,
    network_session_id: String,
    api_key: SecretString,
}

impl Session {
    pub fn new(
        api_key: SecretString,
        user_session_id: impl Into<String>,
        network_id: impl Into<NetworkId>,
        network_session_id: impl Into<String>,
    ) -> Self {
        Self {
            user_session_id: user_session_id.into(),
            network_id: network_id.into(),
            network_session_id: network_session_id.into(),
            api_key,
        }
    }

    /// Session id sent in `x-casambi-session` and in the wire open frame
    pub fn user_session_id(&self) -> &str {
        &self.user_session_id
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn network_session_id(&self) -> &str {
        &self.network_session_id
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Unit or scene identifier after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(u32);

impl TargetId {
    /// Parse an id from loosely typed JSON input.
    ///
    /// Accepts non-negative integers, strings holding an integer and floats
    /// with no fractional part. Everything else is `InvalidArgument`.
    pub fn parse(value: &Value) -> Result<Self> {
        let id = match value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };

        id.and_then(|id| u32::try_from(id).ok())
            .map(Self)
            .ok_or_else(|| {
                CasambiError::invalid("id", format!("{} is not a valid unit or scene id", value))
            })
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Anything that can be turned into a [`TargetId`]
///
/// Every implementation funnels through [`TargetId::parse`].
pub trait IntoTargetId {
    fn into_target_id(self) -> Result<TargetId>;
}

impl IntoTargetId for TargetId {
    fn into_target_id(self) -> Result<TargetId> {
        Ok(self)
    }
}

impl IntoTargetId for &Value {
    fn into_target_id(self) -> Result<TargetId> {
        TargetId::parse(self)
    }
}

impl IntoTargetId for Value {
    fn into_target_id(self) -> Result<TargetId> {
        TargetId::parse(&self)
    }
}

macro_rules! into_target_id_via_value {
    ($($ty:ty),*) => {
        $(
            impl IntoTargetId for $ty {
                fn into_target_id(self) -> Result<TargetId> {
                    TargetId::parse(&Value::from(self))
                }
            }
        )*
    };
}

into_target_id_via_value!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64, &str, String);

/// How to choose a network when the login response lists several
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NetworkSelection {
    /// First entry in the order the server returned them
    #[default]
    First,
    /// A specific network id
    Id(NetworkId),
}

/// Sensor type for datapoint queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    /// Unit datapoints
    Unit = 0,
    /// Sensor datapoints
    Sensor = 1,
}

impl TryFrom<u8> for SensorType {
    type Error = CasambiError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Unit),
            1 => Ok(Self::Sensor),
            other => Err(CasambiError::invalid(
                "sensor_type",
                format!("{} is not one of 0 or 1", other),
            )),
        }
    }
}

/// Unit in which a color temperature is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorTemperatureSource {
    #[default]
    Kelvin,
    Mired,
}

/// Current state of a unit as reported by the REST API
///
/// Only the fields needed for capability checks are interpreted; the raw
/// document is kept for everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitState {
    raw: Value,
}

impl UnitState {
    pub fn from_json(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw_json(&self) -> &Value {
        &self.raw
    }

    pub fn name(&self) -> Option<&str> {
        self.raw.get("name").and_then(Value::as_str)
    }

    pub fn online(&self) -> Option<bool> {
        self.raw.get("online").and_then(Value::as_bool)
    }

    pub fn fixture_id(&self) -> Option<u64> {
        self.raw.get("fixtureId").and_then(Value::as_u64)
    }

    /// Control descriptors with one level of nesting flattened
    ///
    /// Multi-channel fixtures report `controls` as a list of lists.
    pub fn controls(&self) -> Vec<&Value> {
        let Some(Value::Array(items)) = self.raw.get("controls") else {
            return Vec::new();
        };

        let mut controls = Vec::new();
        for item in items {
            match item {
                Value::Array(inner) => controls.extend(inner.iter()),
                other => controls.push(other),
            }
        }
        controls
    }

    fn control(&self, kind: &str) -> Option<&Value> {
        self.controls()
            .into_iter()
            .find(|c| c.get("type").and_then(Value::as_str) == Some(kind))
    }

    pub fn has_control(&self, kind: &str) -> bool {
        self.control(kind).is_some()
    }

    pub fn supports_rgb(&self) -> bool {
        self.has_control("Color")
    }

    pub fn supports_rgbw(&self) -> bool {
        self.has_control("Color") && self.has_control("White")
    }

    pub fn supports_color_temperature(&self) -> bool {
        self.has_control("CCT")
    }

    /// `(min, max)` kelvin of the `CCT` control, `(0, 0)` when absent
    pub fn supported_color_temperature_range(&self) -> (u32, u32) {
        let Some(cct) = self.control("CCT") else {
            return (0, 0);
        };

        let bound = |key: &str| {
            cct.get(key)
                .and_then(Value::as_f64)
                .map(|v| v.round().clamp(0.0, f64::from(u32::MAX)) as u32)
                .unwrap_or(0)
        };

        (bound("min"), bound("max"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_exposes_ids_read_only() {
        let session = Session::new(SecretString::from("key".to_string()), "user", "net", "net-session");
        assert_eq!(session.user_session_id(), "user");
        assert_eq!(session.network_id(), "net");
        assert_eq!(session.network_session_id(), "net-session");
        assert_eq!(session.api_key(), "key");
    }

    #[test]
    fn ids_normalize_to_the_same_integer() {
        let expected = TargetId(12);
        assert_eq!(12u32.into_target_id().unwrap(), expected);
        assert_eq!(12i64.into_target_id().unwrap(), expected);
        assert_eq!("12".into_target_id().unwrap(), expected);
        assert_eq!(String::from(" 12 ").into_target_id().unwrap(), expected);
        assert_eq!(12.0f64.into_target_id().unwrap(), expected);
        assert_eq!(json!(12).into_target_id().unwrap(), expected);
        assert_eq!(json!("12").into_target_id().unwrap(), expected);
    }

    #[test]
    fn rejects_ids_that_are_not_integers() {
        for bad in [
            json!(null),
            json!(true),
            json!("twelve"),
            json!("1.5"),
            json!(1.5),
            json!(-3),
            json!([1]),
            json!({"id": 1}),
            json!(u64::from(u32::MAX) + 1),
        ] {
            let err = TargetId::parse(&bad).unwrap_err();
            assert!(
                matches!(err, CasambiError::InvalidArgument { argument: "id", .. }),
                "{bad} should be rejected, got {err:?}"
            );
        }
        assert!(f64::NAN.into_target_id().is_err());
    }

    #[test]
    fn sensor_type_accepts_only_zero_and_one() {
        assert_eq!(SensorType::try_from(0).unwrap(), SensorType::Unit);
        assert_eq!(SensorType::try_from(1).unwrap(), SensorType::Sensor);
        assert!(matches!(
            SensorType::try_from(2),
            Err(CasambiError::InvalidArgument { argument: "sensor_type", .. })
        ));
    }

    #[test]
    fn capabilities_from_flat_controls() {
        let state = UnitState::from_json(json!({
            "name": "Kitchen",
            "controls": [
                {"type": "Dimmer", "value": 0.5},
                {"type": "CCT", "min": 2200, "max": 6000, "value": 3000},
            ]
        }));

        assert!(state.supports_color_temperature());
        assert!(!state.supports_rgb());
        assert!(!state.supports_rgbw());
        assert_eq!(state.supported_color_temperature_range(), (2200, 6000));
        assert_eq!(state.name(), Some("Kitchen"));
    }

    #[test]
    fn capabilities_from_nested_controls() {
        let state = UnitState::from_json(json!({
            "controls": [[
                {"type": "Dimmer", "value": 1},
                {"type": "Color", "hue": 0.2, "sat": 1},
                {"type": "White", "value": 0.3},
            ]]
        }));

        assert!(state.supports_rgb());
        assert!(state.supports_rgbw());
        assert!(!state.supports_color_temperature());
        assert_eq!(state.controls().len(), 3);
    }

    #[test]
    fn missing_controls_yield_negative_results() {
        let state = UnitState::from_json(json!({"name": "Hall"}));
        assert!(state.controls().is_empty());
        assert!(!state.supports_rgb());
        assert!(!state.supports_rgbw());
        assert!(!state.supports_color_temperature());
        assert_eq!(state.supported_color_temperature_range(), (0, 0));
    }
}
