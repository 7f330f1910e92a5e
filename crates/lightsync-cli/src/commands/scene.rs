//! Scene command handlers

use anyhow::{Context, Result};

use lightsync_core::{ApiClient, DeviceStore, LightingApi};

use crate::output::Output;

/// List all scenes
pub async fn list(client: &ApiClient, output: &Output) -> Result<()> {
    let mut scenes = client.get_scenes().await.context("Failed to load scenes")?;
    scenes.sort_by(|a, b| {
        a.group_id
            .cmp(&b.group_id)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    output.print_scenes(&scenes);
    Ok(())
}

/// Activate a scene
pub async fn activate(client: ApiClient, id: &str, output: &Output) -> Result<()> {
    let delay = client.config().group_refresh_delay();
    let store = DeviceStore::new(client, delay);
    store
        .activate_scene(id)
        .await
        .with_context(|| format!("Failed to activate scene {}", id))?;

    output.success(&format!("Activated scene {}", id));
    Ok(())
}
