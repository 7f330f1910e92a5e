//! Live view and push channel command handlers

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use tokio::sync::watch;

use lightsync_core::models::LightState;
use lightsync_core::{
    spawn_push_channel, ApiClient, ChannelStatus, Config, Dashboard, PushChannelConfig, Snapshot,
};

use crate::output::{Output, OutputFormat};

/// How long `send` waits for the push channel before giving up
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Mount a dashboard and print light changes until Ctrl-C
pub async fn watch(client: ApiClient, config: &Config, output: &Output) -> Result<()> {
    let dashboard = Dashboard::mount_with(client, config).await;
    let store = dashboard.store().clone();

    let mut state_rx = store.subscribe();
    let status_rx = dashboard.channel().status_rx.clone();

    let initial = state_rx.borrow_and_update().clone();
    if let Some(ref err) = initial.error {
        output.failure(&format!("Initial load failed: {}", err));
    } else if output.format == OutputFormat::Human {
        println!(
            "Watching {} light(s), {} group(s) on {} (Ctrl-C to stop)",
            initial.lights.len(),
            initial.groups.len(),
            config.server_url
        );
    }
    let last = light_states(&initial);

    let ctrl_c = tokio::signal::ctrl_c();
    print_changes_until(state_rx, status_rx, last, output, ctrl_c).await;

    dashboard.unmount().await;
    Ok(())
}

/// Print status and light changes until `stop` resolves or a sender is gone
///
/// `stop` is polled across iterations, so a signal between two changes is
/// not lost.
async fn print_changes_until<F: Future>(
    mut state_rx: watch::Receiver<Snapshot>,
    mut status_rx: watch::Receiver<ChannelStatus>,
    mut last: HashMap<String, LightState>,
    output: &Output,
    stop: F,
) {
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,

            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *status_rx.borrow_and_update();
                print_status(status, output);
            }

            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state_rx.borrow_and_update().clone();
                for (id, state) in changed_lights(&last, &snapshot) {
                    print_change(&snapshot, &id, &state, output);
                }
                last = light_states(&snapshot);
            }
        }
    }
}

/// Send one command over the push channel
pub async fn send(
    config: &Config,
    target: &str,
    action: &str,
    params: &[String],
    output: &Output,
) -> Result<()> {
    let params = parse_params(params)?;

    let channel = spawn_push_channel(PushChannelConfig::from(config));
    if !channel.wait_connected(CONNECT_TIMEOUT).await {
        channel.shutdown().await;
        bail!("Could not connect to {}", config.ws_url());
    }

    // Shutdown is queued behind the frame, so it goes out first
    let sent = channel.send_command(target, action, params);
    channel.shutdown().await;

    if !sent {
        bail!("Connection lost before the command could be sent");
    }
    output.success(&format!("Sent {} to {}", action, target));
    Ok(())
}

/// Parse `key=value` pairs; values are JSON when they parse as JSON
pub fn parse_params(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut params = Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("Invalid parameter '{}', expected key=value", pair))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid parameter '{}', key is empty", pair);
        }
        let value =
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

fn light_states(snapshot: &Snapshot) -> HashMap<String, LightState> {
    snapshot
        .lights
        .iter()
        .map(|l| (l.id.clone(), l.state.clone()))
        .collect()
}

/// Lights whose state differs from `last`, in snapshot order
fn changed_lights(last: &HashMap<String, LightState>, snapshot: &Snapshot) -> Vec<(String, LightState)> {
    snapshot
        .lights
        .iter()
        .filter(|l| last.get(&l.id) != Some(&l.state))
        .map(|l| (l.id.clone(), l.state.clone()))
        .collect()
}

fn print_change(snapshot: &Snapshot, id: &str, state: &LightState, output: &Output) {
    let name = snapshot.light(id).map(|l| l.name.as_str()).unwrap_or(id);
    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({"light": id, "state": state}));
        }
        OutputFormat::Quiet => println!("{}", id),
        OutputFormat::Human => {
            println!(
                "{} | {} | {:>3} | {:>4.0}%",
                id,
                name,
                if state.on { "on" } else { "off" },
                state.brightness
            );
        }
    }
}

fn print_status(status: ChannelStatus, output: &Output) {
    if output.format != OutputFormat::Human {
        return;
    }
    match status {
        ChannelStatus::Connected => eprintln!("[push channel connected]"),
        ChannelStatus::Disconnected => eprintln!("[push channel disconnected, retrying]"),
        ChannelStatus::Connecting => {}
    }
}
