//! Group command handlers

use std::time::Duration;

use anyhow::{Context, Result};

use lightsync_core::{ApiClient, DeviceStore, LightingApi};

use super::PowerArgs;
use crate::output::{Output, OutputFormat};

/// List all groups, rooms first
pub async fn list(client: &ApiClient, output: &Output) -> Result<()> {
    let mut groups = client.get_groups().await.context("Failed to load groups")?;
    groups.sort_by(|a, b| {
        a.group_type
            .to_string()
            .cmp(&b.group_type.to_string())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    output.print_groups(&groups);
    Ok(())
}

/// Switch and/or dim a group
///
/// In human mode, waits for the follow-up refresh so the printed state is
/// what the bridge settled on.
pub async fn set(client: ApiClient, id: &str, power: &PowerArgs, output: &Output) -> Result<()> {
    power.validate()?;

    let delay = client.config().group_refresh_delay();
    let store = DeviceStore::new(client, delay);
    store
        .set_group_state(id, power.power(), power.brightness)
        .await
        .with_context(|| format!("Failed to update group {}", id))?;

    let mut settled = None;
    if output.format == OutputFormat::Human {
        let mut rx = store.subscribe();
        let wait = tokio::time::timeout(
            delay + Duration::from_secs(5),
            rx.wait_for(|s| s.generation > 0),
        )
        .await;
        if let Ok(Ok(snapshot)) = wait {
            settled = snapshot.group(id).cloned();
        }
    }
    store.shutdown();

    match settled {
        Some(group) => {
            let state = if group.state.all_on {
                "all on"
            } else if group.state.any_on {
                "some on"
            } else {
                "off"
            };
            output.success(&format!("Group {} is now {}", group.name, state));
        }
        None => output.success(&format!("Group {} set {}", id, power.describe())),
    }
    Ok(())
}
