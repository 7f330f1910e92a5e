//! Push channel tests against a local WebSocket server

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use lightsync_core::models::{DeviceCommand, Group, Light, LightState, Scene};
use lightsync_core::{
    spawn_push_channel, ApiResult, ChannelStatus, Config, Dashboard, LightingApi,
    PushChannelConfig, ServerEvent,
};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const INTERVAL: Duration = Duration::from_millis(100);
const WAIT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{}/ws", addr))
}

fn channel_config(url: &str) -> PushChannelConfig {
    PushChannelConfig {
        url: url.to_string(),
        reconnect_interval: INTERVAL,
    }
}

/// Accept connections forever, closing each one right away.
/// Reports the time of every accept.
fn spawn_closing_server(listener: TcpListener) -> mpsc::UnboundedReceiver<Instant> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let _ = tx.send(Instant::now());
            if let Ok(mut ws) = accept_async(stream).await {
                let _ = ws.close(None).await;
                while let Some(Ok(_)) = ws.next().await {}
            }
        }
    });
    rx
}

#[tokio::test]
async fn test_status_frame_is_forwarded() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"status","device":"A","state":{"brightness":70}}"#.to_string(),
        ))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mut handle = spawn_push_channel(channel_config(&url));
    let mut events = handle.take_events().unwrap();
    assert!(handle.take_events().is_none());

    let event = tokio::time::timeout(WAIT, events.recv())
        .await
        .unwrap()
        .unwrap();

    match event {
        ServerEvent::Status { device, state } => {
            assert_eq!(device, "A");
            assert_eq!(state.brightness, Some(70.0));
            assert!(state.on.is_none());
        }
        other => panic!("Expected Status event, got {:?}", other),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection() {
    let (listener, url) = bind().await;
    let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let _ = accepted_tx.send(());
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text("{not json".to_string())).await.unwrap();
            ws.send(Message::Text(r#"{"type":"ack","target":"wz_decke"}"#.to_string()))
                .await
                .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        }
    });

    let mut handle = spawn_push_channel(channel_config(&url));
    let mut events = handle.take_events().unwrap();

    let event = tokio::time::timeout(WAIT, events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        ServerEvent::Ack {
            target: "wz_decke".to_string()
        }
    );

    // Still on the first connection
    assert_eq!(handle.status(), ChannelStatus::Connected);
    assert!(accepted_rx.try_recv().is_ok());
    assert!(accepted_rx.try_recv().is_err());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_after_each_close_at_fixed_interval() {
    let (listener, url) = bind().await;
    let mut accepts = spawn_closing_server(listener);

    let handle = spawn_push_channel(channel_config(&url));

    // Initial connection plus one reconnect per close
    let closes = 3;
    let mut times = Vec::new();
    for _ in 0..=closes {
        let at = tokio::time::timeout(WAIT, accepts.recv())
            .await
            .unwrap()
            .unwrap();
        times.push(at);
    }

    for pair in times.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(gap >= INTERVAL, "reconnected after {:?}", gap);
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_no_attempts_after_shutdown() {
    let (listener, url) = bind().await;
    let mut accepts = spawn_closing_server(listener);

    let handle = spawn_push_channel(channel_config(&url));
    tokio::time::timeout(WAIT, accepts.recv())
        .await
        .unwrap()
        .unwrap();

    handle.shutdown().await;
    while accepts.try_recv().is_ok() {}

    tokio::time::sleep(INTERVAL * 4).await;
    assert!(accepts.try_recv().is_err());
}

#[tokio::test]
async fn test_command_sent_while_connected() {
    let (listener, url) = bind().await;
    let (frame_tx, frame_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let _ = frame_tx.send(text);
                break;
            }
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    let handle = spawn_push_channel(channel_config(&url));
    assert!(handle.wait_connected(WAIT).await);

    let mut params = Map::new();
    params.insert("on".to_string(), json!(true));
    assert!(handle.send_command("wz_decke", "set", params));

    let text = tokio::time::timeout(WAIT, frame_rx).await.unwrap().unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        value,
        json!({"type": "command", "target": "wz_decke", "action": "set", "params": {"on": true}})
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn test_unconsumed_events_do_not_block_commands() {
    let (listener, url) = bind().await;
    let (frame_tx, frame_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        // More frames than the event queue holds
        for i in 0..100 {
            let frame = json!({"type": "status", "device": "A", "state": {"brightness": i}});
            ws.send(Message::Text(frame.to_string())).await.unwrap();
        }
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let _ = frame_tx.send(text);
                break;
            }
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    // Nobody takes the event receiver
    let handle = spawn_push_channel(channel_config(&url));
    assert!(handle.wait_connected(WAIT).await);
    // Let the flood fill the queue
    tokio::time::sleep(INTERVAL).await;

    assert!(handle.send_command("wz_decke", "set", Map::new()));
    let text = tokio::time::timeout(WAIT, frame_rx).await.unwrap().unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["target"], "wz_decke");

    tokio::time::timeout(WAIT, handle.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_status_reported_disconnected_after_close() {
    let (listener, url) = bind().await;
    let mut accepts = spawn_closing_server(listener);

    let handle = spawn_push_channel(PushChannelConfig {
        url,
        reconnect_interval: Duration::from_secs(3600),
    });

    // Once the server has accepted, the channel is past its initial status
    tokio::time::timeout(WAIT, accepts.recv())
        .await
        .unwrap()
        .unwrap();
    let mut status = handle.status_rx.clone();
    tokio::time::timeout(WAIT, status.wait_for(|s| *s == ChannelStatus::Disconnected))
        .await
        .unwrap()
        .unwrap();

    // Nothing goes out while waiting to reconnect
    assert!(!handle.send_command("wz_decke", "set", Map::new()));

    handle.shutdown().await;
}

// ==================== Dashboard ====================

struct StaticApi {
    lights: Vec<Light>,
}

#[async_trait]
impl LightingApi for StaticApi {
    async fn get_devices(&self) -> ApiResult<Vec<Light>> {
        Ok(self.lights.clone())
    }

    async fn get_groups(&self) -> ApiResult<Vec<Group>> {
        Ok(Vec::new())
    }

    async fn get_scenes(&self) -> ApiResult<Vec<Scene>> {
        Ok(Vec::new())
    }

    async fn set_device(&self, _id: &str, _command: &DeviceCommand) -> ApiResult<()> {
        Ok(())
    }

    async fn set_group(&self, _id: &str, _command: &DeviceCommand) -> ApiResult<()> {
        Ok(())
    }

    async fn activate_scene(&self, _id: &str) -> ApiResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_dashboard_applies_push_events() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (go_tx, go_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ = go_rx.await;
        ws.send(Message::Text(
            r#"{"type":"status","device":"A","state":{"brightness":70}}"#.to_string(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(
            r#"{"type":"status","device":"ghost","state":{"on":true}}"#.to_string(),
        ))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let config = Config {
        server_url: format!("http://{}", addr),
        reconnect_interval_ms: 100,
        ..Config::default()
    };
    let api = StaticApi {
        lights: vec![
            Light {
                id: "A".to_string(),
                name: "Ceiling".to_string(),
                state: LightState {
                    on: true,
                    brightness: 40.0,
                    reachable: true,
                    ..Default::default()
                },
                ..Default::default()
            },
            Light {
                id: "B".to_string(),
                name: "Floor".to_string(),
                ..Default::default()
            },
        ],
    };

    let dashboard = Dashboard::mount_with(api, &config).await;
    assert_eq!(dashboard.store().snapshot().lights.len(), 2);
    assert!(dashboard.channel().wait_connected(WAIT).await);

    let mut rx = dashboard.store().subscribe();
    go_tx.send(()).unwrap();

    tokio::time::timeout(
        WAIT,
        rx.wait_for(|s| s.light("A").map(|l| l.state.brightness) == Some(70.0)),
    )
    .await
    .unwrap()
    .unwrap();

    let snapshot = dashboard.store().snapshot();
    assert!(snapshot.light("A").unwrap().state.on);
    assert_eq!(snapshot.lights.len(), 2);
    assert!(!snapshot.light("B").unwrap().state.on);
    assert!(snapshot.error.is_none());

    assert!(dashboard.send_command("A", "set", Map::new()));
    dashboard.unmount().await;
}
