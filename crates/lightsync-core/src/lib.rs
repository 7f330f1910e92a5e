//! Lightsync Core Library
//!
//! Client-side state synchronization for a lighting gateway that bridges a
//! home-automation controller to a lighting bridge.
//!
//! # Architecture
//!
//! - **REST API**: source of truth; every command and full reload goes here
//! - **Push channel**: WebSocket stream of light status changes, merged into
//!   local state as they arrive
//!
//! The [`DeviceStore`] holds the local view. Commands patch it optimistically
//! before the request goes out; group commands are followed by a delayed
//! full refresh.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let dashboard = Dashboard::mount(&config).await?;
//!
//! dashboard.store().set_light_state("1", Some(true), None).await?;
//! let lights = dashboard.store().snapshot().lights;
//!
//! dashboard.unmount().await;
//! ```
//!
//! # Modules
//!
//! - `api`: REST client for the gateway
//! - `store`: Device store (lights, groups, scenes)
//! - `push`: Persistent WebSocket push channel
//! - `session`: Dashboard mount/unmount lifecycle
//! - `models`: Data structures exchanged with the gateway
//! - `error`: API errors and user-facing messages
//! - `config`: Application configuration

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod push;
pub mod session;
pub mod store;

pub use api::{ApiClient, LightingApi};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use models::{Group, Light, LightState, LightStatePatch, Mapping, Scene};
pub use push::{spawn_push_channel, ChannelStatus, PushChannelConfig, PushChannelHandle, ServerEvent};
pub use session::Dashboard;
pub use store::{DeviceStore, Snapshot};
