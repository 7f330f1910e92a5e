//! Persistent push connection
//!
//! Maintains a long-lived WebSocket connection to the gateway.
//! Reconnects forever at a fixed interval; there is no backoff growth and
//! no retry limit since the gateway sits on the local network.

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::message::{ClientMessage, ServerEvent};
use crate::config::Config;

/// Commands sent to the channel task
#[derive(Debug)]
enum ChannelCommand {
    /// Encoded text frame to transmit
    Send(String),
    /// Close the connection and stop reconnecting
    Shutdown,
}

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Not connected; a reconnect may be pending
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Connected and forwarding events
    Connected,
}

/// Configuration for the push channel
#[derive(Debug, Clone)]
pub struct PushChannelConfig {
    /// WebSocket URL
    pub url: String,
    /// Fixed delay between a disconnect and the next attempt
    pub reconnect_interval: Duration,
}

impl Default for PushChannelConfig {
    fn default() -> Self {
        Self {
            url: Config::default().ws_url(),
            reconnect_interval: Duration::from_millis(5000),
        }
    }
}

impl From<&Config> for PushChannelConfig {
    fn from(config: &Config) -> Self {
        Self {
            url: config.ws_url(),
            reconnect_interval: config.reconnect_interval(),
        }
    }
}

/// Handle to control the push channel task
pub struct PushChannelHandle {
    command_tx: mpsc::Sender<ChannelCommand>,
    event_rx: Option<mpsc::Receiver<ServerEvent>>,
    /// Watch connection status
    pub status_rx: watch::Receiver<ChannelStatus>,
    task: JoinHandle<()>,
}

impl PushChannelHandle {
    /// Take the event receiver (can only be called once)
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ServerEvent>> {
        self.event_rx.take()
    }

    /// Get the current status
    pub fn status(&self) -> ChannelStatus {
        *self.status_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ChannelStatus::Connected
    }

    /// Wait until the channel reports Connected, up to `timeout`
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let mut rx = self.status_rx.clone();
        // Bound first so the borrowed status drops before `rx`
        let connected = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|s| *s == ChannelStatus::Connected)).await,
            Ok(Ok(_))
        );
        connected
    }

    /// Send a command over the socket
    ///
    /// Only transmitted while connected. Otherwise the command is dropped
    /// without error; use the REST API when delivery matters. Returns
    /// whether the frame was handed to the connection.
    pub fn send_command(&self, target: &str, action: &str, params: Map<String, Value>) -> bool {
        if !self.is_connected() {
            debug!("Push channel not connected, dropping command for {}", target);
            return false;
        }

        let frame = match ClientMessage::command(target, action, params).encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode command for {}: {}", target, e);
                return false;
            }
        };

        self.command_tx.try_send(ChannelCommand::Send(frame)).is_ok()
    }

    /// Close the connection, cancel any pending reconnect and wait for the task to end
    pub async fn shutdown(self) {
        let _ = self.command_tx.send(ChannelCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

/// Spawn the push channel task
///
/// The task connects immediately and reconnects after every close or
/// error until [`PushChannelHandle::shutdown`] is called or the handle is
/// dropped. Events that arrive while the queue is full, or before anyone
/// has taken the receiver and drained it, are dropped.
pub fn spawn_push_channel(config: PushChannelConfig) -> PushChannelHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(64);
    let (status_tx, status_rx) = watch::channel(ChannelStatus::Disconnected);

    let task = tokio::spawn(channel_loop(config, command_rx, event_tx, status_tx));

    PushChannelHandle {
        command_tx,
        event_rx: Some(event_rx),
        status_rx,
        task,
    }
}

/// Main loop: connect, forward frames, wait, repeat
async fn channel_loop(
    config: PushChannelConfig,
    mut command_rx: mpsc::Receiver<ChannelCommand>,
    event_tx: mpsc::Sender<ServerEvent>,
    status_tx: watch::Sender<ChannelStatus>,
) {
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        let _ = status_tx.send(ChannelStatus::Connecting);
        debug!("Connecting to {} (attempt {})", config.url, attempt);

        let Some(result) = until_shutdown(connect_async(config.url.as_str()), &mut command_rx).await
        else {
            break;
        };

        match result {
            Ok((ws_stream, _response)) => {
                let _ = status_tx.send(ChannelStatus::Connected);
                info!("Push channel connected to {}", config.url);

                let shutdown = forward_frames(ws_stream, &mut command_rx, &event_tx).await;
                if shutdown {
                    break;
                }
                info!("Push channel disconnected");
            }
            Err(e) => {
                warn!("Push channel connection failed: {}", e);
            }
        }

        let _ = status_tx.send(ChannelStatus::Disconnected);

        // Wait before reconnecting, but honour shutdown
        if until_shutdown(tokio::time::sleep(config.reconnect_interval), &mut command_rx)
            .await
            .is_none()
        {
            break;
        }
    }

    let _ = status_tx.send(ChannelStatus::Disconnected);
    debug!("Push channel task stopped");
}

/// Drive `fut` to completion while dropping any commands that arrive
///
/// Returns `None` if shutdown was requested (or every handle is gone).
async fn until_shutdown<F: Future>(
    fut: F,
    command_rx: &mut mpsc::Receiver<ChannelCommand>,
) -> Option<F::Output> {
    tokio::pin!(fut);

    loop {
        tokio::select! {
            out = &mut fut => return Some(out),
            cmd = command_rx.recv() => {
                match cmd {
                    Some(ChannelCommand::Send(_)) => {
                        debug!("Push channel not connected, dropping command");
                    }
                    Some(ChannelCommand::Shutdown) | None => return None,
                }
            }
        }
    }
}

/// Run one connection until it closes or shutdown is requested
///
/// Returns true when the caller should stop reconnecting.
async fn forward_frames(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    command_rx: &mut mpsc::Receiver<ChannelCommand>,
    event_tx: &mpsc::Sender<ServerEvent>,
) -> bool {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(ChannelCommand::Send(frame)) => {
                        if let Err(e) = write.send(Message::Text(frame)).await {
                            warn!("Push channel send failed: {}", e);
                            return false;
                        }
                    }
                    Some(ChannelCommand::Shutdown) | None => {
                        write.close().await.ok();
                        return true;
                    }
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match ServerEvent::decode(&text) {
                        // Must not block on the consumer
                        Ok(event) => match event_tx.try_send(event) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                warn!("Push event queue full, dropping event");
                            }
                            Err(TrySendError::Closed(_)) => {
                                debug!("No event consumer, discarding push event");
                            }
                        },
                        Err(e) => {
                            warn!("Discarding malformed push frame: {}", e);
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Err(e)) => {
                        warn!("Push channel error: {}", e);
                        return false;
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PushChannelConfig::default();
        assert_eq!(config.url, "ws://localhost:8080/ws");
        assert_eq!(config.reconnect_interval, Duration::from_millis(5000));
    }

    #[test]
    fn test_config_from_app_config() {
        let app = Config {
            server_url: "https://gw.local".to_string(),
            reconnect_interval_ms: 750,
            ..Config::default()
        };
        let config = PushChannelConfig::from(&app);
        assert_eq!(config.url, "wss://gw.local/ws");
        assert_eq!(config.reconnect_interval, Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_send_command_while_disconnected_is_dropped() {
        let handle = spawn_push_channel(PushChannelConfig {
            url: "ws://127.0.0.1:9/ws".to_string(),
            reconnect_interval: Duration::from_secs(60),
        });

        assert!(!handle.is_connected());
        assert!(!handle.send_command("wz_decke", "set", Map::new()));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_reconnect() {
        let handle = spawn_push_channel(PushChannelConfig {
            url: "ws://127.0.0.1:9/ws".to_string(),
            reconnect_interval: Duration::from_secs(3600),
        });

        // Wait for the first failed attempt to land in the reconnect wait
        let mut status = handle.status_rx.clone();
        let _ = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if status.changed().await.is_err() {
                    break;
                }
                if *status.borrow() == ChannelStatus::Disconnected {
                    break;
                }
            }
        })
        .await;

        // Must return promptly despite the hour-long reconnect delay
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .unwrap();
    }
}
