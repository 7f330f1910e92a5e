//! Push channel to the gateway
//!
//! Keeps a WebSocket open to the gateway's `/ws` endpoint so light status
//! changes arrive without polling. Commands can travel the other way as a
//! best-effort alternative to the REST API.
//!
//! ## Protocol
//!
//! One JSON object per text frame:
//! - server → client: `{"type":"status","device":"<light id>","state":{...}}`
//!   (plus `ack` and `error` frames)
//! - client → server: `{"type":"command","target":"...","action":"...","params":{...}}`
//!
//! ## Usage
//!
//! ```ignore
//! let mut channel = spawn_push_channel(PushChannelConfig::from(&config));
//! let mut events = channel.take_events().unwrap();
//! while let Some(event) = events.recv().await {
//!     store.apply_push_event(&event);
//! }
//! ```

mod channel;
mod message;

pub use channel::{spawn_push_channel, ChannelStatus, PushChannelConfig, PushChannelHandle};
pub use message::{ClientMessage, ServerEvent};
