//! Bridge setup command handlers

use anyhow::{bail, Context, Result};

use lightsync_core::error::{describe_pairing_error, describe_test_error};
use lightsync_core::models::BridgeTestResult;
use lightsync_core::{ApiClient, ApiError};

use crate::output::{Output, OutputFormat};

/// Show pairing status
pub async fn show(client: &ApiClient, output: &Output) -> Result<()> {
    let status = client
        .bridge_status()
        .await
        .context("Failed to read bridge status")?;

    match output.format {
        OutputFormat::Json => output.json(&status),
        OutputFormat::Quiet => println!("{}", status.configured),
        OutputFormat::Human => {
            if status.configured {
                println!("Bridge is paired.");
                if let Some(ref info) = status.info {
                    if let Ok(text) = serde_json::to_string_pretty(info) {
                        println!("{}", text);
                    }
                }
            } else {
                println!("No bridge paired.");
                println!();
                println!("Find one with:  lightsync bridge discover");
            }
        }
    }

    Ok(())
}

/// List bridges found on the gateway's network
pub async fn discover(client: &ApiClient, output: &Output) -> Result<()> {
    let bridges = client
        .discover_bridges()
        .await
        .context("Bridge discovery failed")?;

    match output.format {
        OutputFormat::Json => output.json(&bridges),
        OutputFormat::Quiet => {
            for bridge in &bridges {
                println!("{}", bridge.ip);
            }
        }
        OutputFormat::Human => {
            if bridges.is_empty() {
                println!("No bridges found.");
                println!();
                println!("If you know the bridge's IP address, pair with it directly:");
                println!("  lightsync bridge pair <ip>");
                return Ok(());
            }
            for bridge in &bridges {
                let name = if bridge.name.is_empty() {
                    "Bridge"
                } else {
                    bridge.name.as_str()
                };
                if bridge.id.is_empty() {
                    println!("{} | {}", bridge.ip, name);
                } else {
                    println!("{} | {} ({})", bridge.ip, name, bridge.id);
                }
            }
            println!("\n{} bridge(s)", bridges.len());
        }
    }

    Ok(())
}

/// Pair with the bridge at `ip`
pub async fn pair(client: &ApiClient, ip: &str, output: &Output) -> Result<()> {
    let ip = ip.trim();
    if ip.is_empty() {
        bail!("Bridge IP address is required");
    }

    if !output.is_quiet() && !output.is_json() {
        println!("Pairing with {}...", ip);
    }

    match client.pair_bridge(ip).await {
        Ok(result) if result.success => {
            match output.format {
                OutputFormat::Json => output.json(&result),
                _ => output.success(&format!("Paired with bridge at {}", ip)),
            }
            Ok(())
        }
        Ok(_) => bail!(describe_pairing_error("pairing rejected", ip)),
        Err(ApiError::Api { message, .. }) => bail!(describe_pairing_error(&message, ip)),
        Err(e) => Err(e).context("Failed to reach the gateway"),
    }
}

/// Run the connectivity checks against `ip`
pub async fn test(client: &ApiClient, ip: &str, output: &Output) -> Result<()> {
    let result = match client.test_bridge(ip.trim()).await {
        Ok(result) => result,
        Err(ApiError::Api { message, .. }) => bail!(describe_test_error(&message)),
        Err(e) => return Err(e).context("Failed to reach the gateway"),
    };

    match output.format {
        OutputFormat::Json => output.json(&result),
        OutputFormat::Quiet => println!("{}", if result.all_ok() { "ok" } else { "failed" }),
        OutputFormat::Human => print_check_report(&result),
    }

    if !result.all_ok() {
        bail!("Bridge at {} is not fully reachable", result.bridge_ip);
    }
    Ok(())
}

fn print_check_report(result: &BridgeTestResult) {
    println!("Connectivity to {}", result.bridge_ip);
    println!();

    let dns_detail = if result.dns_lookup.addresses.is_empty() {
        String::new()
    } else {
        result.dns_lookup.addresses.join(", ")
    };
    print_check(
        "DNS lookup",
        result.dns_lookup.success,
        &dns_detail,
        result.dns_lookup.error.as_deref(),
    );
    print_check(
        "TCP 443",
        result.tcp_443.success,
        "",
        result.tcp_443.error.as_deref(),
    );
    print_check(
        "TCP 80",
        result.tcp_80.success,
        "",
        result.tcp_80.error.as_deref(),
    );
    let https_detail = result
        .https_request
        .status_code
        .map(|c| format!("HTTP {}", c))
        .unwrap_or_default();
    print_check(
        "HTTPS",
        result.https_request.success,
        &https_detail,
        result.https_request.error.as_deref(),
    );
}

fn print_check(label: &str, success: bool, detail: &str, error: Option<&str>) {
    let mark = if success { "✓" } else { "✗" };
    let extra = match (success, error) {
        (false, Some(err)) => format!(" ({})", err),
        _ if !detail.is_empty() => format!(" ({})", detail),
        _ => String::new(),
    };
    println!("  {} {:<11}{}", mark, label, extra);
}
