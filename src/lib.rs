//! Rust library for controlling Casambi lighting networks through the Casambi cloud
//!
//! This library provides an async API on top of the Casambi cloud REST and
//! WebSocket interfaces. It supports:
//!
//! - User and network session creation
//! - Network, unit, scene, fixture and datapoint queries
//! - Unit control over a WebSocket wire (on/off, dimmer, RGB, RGBW, color temperature)
//! - Scene control
//! - Draining asynchronous push events from the wire
//! - Network lookup by UUID or bridge MAC on the app API
//!
//! # Quick Start
//!
//! ```no_run
//! use casambi_cloud::{CasambiClient, ColorTemperatureSource, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("casambi.yaml")?;
//!     let mut client = CasambiClient::connect(&config).await?;
//!
//!     client.set_dimmer(1, 0.5).await?;
//!     if client.unit_supports_color_temperature(1).await? {
//!         client
//!             .set_color_temperature(1, 3000, ColorTemperatureSource::Kelvin)
//!             .await?;
//!     }
//!
//!     for event in client.drain().await? {
//!         println!("Event: {}", event.raw_json());
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Lower-level pieces
//!
//! The session and the channel can be driven separately:
//!
//! ```no_run
//! use casambi_cloud::{ControlChannel, NetworkSelection, SessionManager};
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rest = SessionManager::new(SecretString::from("api-key".to_string()))?;
//!     let session = rest
//!         .login("me@example.com", "user-pw", "network-pw", &NetworkSelection::First)
//!         .await?;
//!
//!     let mut channel = ControlChannel::new();
//!     if channel.open(&session, 1).await? {
//!         channel.turn_off(1).await?;
//!         channel.close().await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Client**: one object holding the session and the control channel
//! - **Rest**: authentication and REST queries (`https://door.casambi.com/v1`)
//! - **Channel**: WebSocket wire lifecycle and control frames
//! - **Protocol**: JSON frame structures
//! - **Color**: color temperature and hue/saturation conversions
//! - **Types**: sessions, ids and unit state
//! - **Private**: network lookup and password login on the app API (`https://api.casambi.com`)
//! - **Config**: YAML credentials file

mod channel;
mod client;
mod color;
mod config;
mod error;
mod private;
mod protocol;
mod rest;
mod types;

// Public exports
pub use channel::{ControlChannel, WireState, DEFAULT_DRAIN_TIMEOUT, DEFAULT_WS_URL};
pub use client::CasambiClient;
pub use color::{mired_to_kelvin, resolve_color_temperature, rgb_to_hue_sat, snap_kelvin};
pub use config::{Config, DEFAULT_CONFIG_FILE};
pub use error::{CasambiError, Result};
pub use private::{
    normalize_network_uuid, PrivateApi, PrivateSession, DEFAULT_DEVICE_NAME, DEFAULT_PRIVATE_API_URL,
};
pub use protocol::{ControlMessage, ControlPayload, FrameId, InboundKind, InboundMessage, Method, WireStatus};
pub use rest::{SessionManager, DEFAULT_REST_URL};
pub use types::{
    ColorTemperatureSource, IntoTargetId, NetworkId, NetworkSelection, SensorType, Session,
    TargetId, UnitState, WireId, DEFAULT_WIRE,
};
