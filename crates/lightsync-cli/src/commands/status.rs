//! Status command handler

use anyhow::{Context, Result};

use lightsync_core::ApiClient;

use crate::output::{Output, OutputFormat};

/// Show gateway health, bridge pairing and gateway settings
pub async fn show(client: &ApiClient, output: &Output) -> Result<()> {
    let health = client
        .health()
        .await
        .with_context(|| format!("Gateway at {} is not responding", client.config().server_url))?;
    let bridge = client
        .bridge_status()
        .await
        .context("Failed to read bridge status")?;
    // Older gateways don't expose /config
    let gateway = client.gateway_config().await.ok();

    match output.format {
        OutputFormat::Json => {
            output.json(&serde_json::json!({
                "server_url": client.config().server_url,
                "health": health,
                "bridge": bridge,
                "gateway": gateway,
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", health.status);
        }
        OutputFormat::Human => {
            println!("Lightsync Status");
            println!("================");
            println!();
            println!("Gateway:");
            println!("  URL:    {}", client.config().server_url);
            println!("  Health: {}", health.status);
            if let Some(ts) = health.timestamp {
                println!("  Time:   {}", ts.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            println!();
            println!("Bridge:");
            println!(
                "  Status: {}",
                if bridge.configured {
                    "paired"
                } else {
                    "not paired"
                }
            );
            if let Some(ref gw) = gateway {
                if !gw.hue.bridge_ip.is_empty() {
                    println!("  IP:     {}", gw.hue.bridge_ip);
                }
                println!();
                println!("Controller:");
                if gw.loxone.host.is_empty() {
                    println!("  (not configured)");
                } else {
                    println!("  {}:{}", gw.loxone.host, gw.loxone.port);
                }
            }
            if !bridge.configured {
                println!();
                println!("Pair a bridge with:");
                println!("  lightsync bridge discover");
                println!("  lightsync bridge pair <ip>");
            }
        }
    }

    Ok(())
}
