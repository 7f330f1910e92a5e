//! Light command handlers

use anyhow::{Context, Result};

use lightsync_core::{ApiClient, DeviceStore, LightingApi};

use super::PowerArgs;
use crate::output::Output;

/// List all lights
pub async fn list(client: &ApiClient, output: &Output) -> Result<()> {
    let mut lights = client.get_devices().await.context("Failed to load lights")?;
    lights.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    output.print_lights(&lights);
    Ok(())
}

/// Show light details
pub async fn show(client: &ApiClient, id: &str, output: &Output) -> Result<()> {
    let light = client
        .get_device(id)
        .await
        .with_context(|| format!("Failed to load light {}", id))?;
    output.print_light(&light);
    Ok(())
}

/// Switch and/or dim a light
pub async fn set(client: ApiClient, id: &str, power: &PowerArgs, output: &Output) -> Result<()> {
    power.validate()?;

    let delay = client.config().group_refresh_delay();
    let store = DeviceStore::new(client, delay);
    store
        .set_light_state(id, power.power(), power.brightness)
        .await
        .with_context(|| format!("Failed to update light {}", id))?;

    output.success(&format!("Light {} set {}", id, power.describe()));
    Ok(())
}
