//! Mapping command handlers
//!
//! Mappings connect a controller-side identifier to a light, group or
//! scene on the bridge. The server's response is always the new truth.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use lightsync_core::models::{
    ImportMode, Mapping, MappingUpdate, MappingsBackup, NewMapping, ResourceType,
};
use lightsync_core::{ApiClient, Config};

use crate::output::{Output, OutputFormat};

/// A controller command line with a short label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideCommand {
    pub label: &'static str,
    pub command: String,
}

/// Build a `NewMapping` from CLI arguments
pub fn new_mapping(
    name: String,
    loxone_id: String,
    hue_id: String,
    hue_type: &str,
    description: Option<String>,
    enabled: bool,
) -> Result<NewMapping> {
    let name = name.trim().to_string();
    let loxone_id = loxone_id.trim().to_string();
    let hue_id = hue_id.trim().to_string();
    if name.is_empty() || loxone_id.is_empty() || hue_id.is_empty() {
        bail!("name, loxone_id and hue_id must not be empty");
    }

    Ok(NewMapping {
        name,
        loxone_id,
        hue_id,
        hue_type: parse_resource_type(hue_type)?,
        enabled,
        description: description.filter(|d| !d.trim().is_empty()),
    })
}

/// Build a partial update; at least one field must be set
pub fn mapping_update(
    name: Option<String>,
    loxone_id: Option<String>,
    hue_id: Option<String>,
    hue_type: Option<&str>,
    description: Option<String>,
    enabled: Option<bool>,
) -> Result<MappingUpdate> {
    let update = MappingUpdate {
        name,
        loxone_id,
        hue_id,
        hue_type: hue_type.map(parse_resource_type).transpose()?,
        enabled,
        description,
    };
    if update == MappingUpdate::default() {
        bail!("Nothing to update. Pass at least one field to change.");
    }
    Ok(update)
}

fn parse_resource_type(s: &str) -> Result<ResourceType> {
    s.parse::<ResourceType>()
        .map_err(|e| anyhow::anyhow!("{}", e))
}

/// List all mappings
pub async fn list(client: &ApiClient, output: &Output) -> Result<()> {
    let mappings = client
        .get_mappings()
        .await
        .context("Failed to load mappings")?;
    output.print_mappings(&mappings);
    Ok(())
}

/// Create a mapping and show what the server stored
pub async fn create(client: &ApiClient, mapping: &NewMapping, output: &Output) -> Result<()> {
    let created = client
        .create_mapping(mapping)
        .await
        .context("Failed to create mapping")?;

    match output.format {
        OutputFormat::Human => {
            output.success(&format!("Created mapping {}", created.id));
            output.print_mapping(&created);
        }
        _ => output.print_mapping(&created),
    }
    Ok(())
}

/// Update a mapping
pub async fn update(
    client: &ApiClient,
    id: &str,
    update: &MappingUpdate,
    output: &Output,
) -> Result<()> {
    let updated = client
        .update_mapping(id, update)
        .await
        .with_context(|| format!("Failed to update mapping {}", id))?;

    match output.format {
        OutputFormat::Human => {
            output.success(&format!("Updated mapping {}", updated.id));
            output.print_mapping(&updated);
        }
        _ => output.print_mapping(&updated),
    }
    Ok(())
}

/// Delete a mapping
pub async fn delete(client: &ApiClient, id: &str, output: &Output) -> Result<()> {
    client
        .delete_mapping(id)
        .await
        .with_context(|| format!("Failed to delete mapping {}", id))?;
    output.success(&format!("Deleted mapping {}", id));
    Ok(())
}

/// Export all mappings to a backup file
pub async fn export(client: &ApiClient, file: Option<PathBuf>, output: &Output) -> Result<()> {
    let backup = client
        .export_mappings()
        .await
        .context("Failed to export mappings")?;

    let path = file.unwrap_or_else(|| default_backup_path(&backup));
    write_backup(&path, &backup)?;

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "file": path,
            "mappings": backup.mappings.len(),
        })),
        OutputFormat::Quiet => println!("{}", path.display()),
        OutputFormat::Human => output.success(&format!(
            "Exported {} mapping(s) to {}",
            backup.mappings.len(),
            path.display()
        )),
    }
    Ok(())
}

/// Import mappings from a backup file
pub async fn import(client: &ApiClient, file: &Path, mode: ImportMode, output: &Output) -> Result<()> {
    let backup = read_backup(file)?;

    let result = client
        .import_mappings(&backup, mode)
        .await
        .context("Failed to import mappings")?;

    match output.format {
        OutputFormat::Json => output.json(&result),
        OutputFormat::Quiet => {}
        OutputFormat::Human => {
            output.success(&format!(
                "Imported {} of {} mapping(s) ({} mode)",
                result.imported + result.updated,
                result.total,
                mode
            ));
            println!("  new:     {}", result.imported);
            println!("  updated: {}", result.updated);
            println!("  skipped: {}", result.skipped);
        }
    }
    Ok(())
}

/// Print the controller commands for one mapping
pub async fn guide(client: &ApiClient, config: &Config, id: &str, output: &Output) -> Result<()> {
    let mappings = client
        .get_mappings()
        .await
        .context("Failed to load mappings")?;
    let Some(mapping) = mappings.into_iter().find(|m| m.id == id || m.loxone_id == id) else {
        bail!("Mapping not found: {}", id);
    };

    let commands = controller_commands(&mapping);

    match output.format {
        OutputFormat::Json => {
            let lines: Vec<_> = commands
                .iter()
                .map(|c| serde_json::json!({"label": c.label, "command": c.command}))
                .collect();
            output.json(&serde_json::json!({
                "mapping": mapping,
                "address": config.server_url,
                "commands": lines,
            }));
        }
        OutputFormat::Quiet => {
            for c in &commands {
                println!("{}", c.command);
            }
        }
        OutputFormat::Human => {
            println!("{} ({} {})", mapping.name, mapping.hue_type, mapping.hue_id);
            println!();
            println!("Virtual output address: {}", config.server_url);
            println!();
            for c in &commands {
                println!("  {:<22} {}", c.label, c.command);
            }
            println!();
            if mapping.hue_type == ResourceType::Scene {
                println!("Use a pulse input; the scene is activated on every pulse.");
            } else {
                println!("Add these as virtual output commands. <v> is replaced by the analog value.");
            }
            if !mapping.enabled {
                println!();
                println!("Note: this mapping is disabled. Enable it with:");
                println!("  lightsync mapping update {} --enable", mapping.id);
            }
        }
    }
    Ok(())
}

/// Controller command lines for a mapping
pub fn controller_commands(mapping: &Mapping) -> Vec<GuideCommand> {
    let id = &mapping.loxone_id;

    if mapping.hue_type == ResourceType::Scene {
        return vec![GuideCommand {
            label: "Activate",
            command: format!("/ws?cmd=SCENE {}", id),
        }];
    }

    vec![
        GuideCommand {
            label: "On",
            command: format!("/ws?cmd=SET {} ON", id),
        },
        GuideCommand {
            label: "Off",
            command: format!("/ws?cmd=SET {} OFF", id),
        },
        GuideCommand {
            label: "Brightness (0-100%)",
            command: format!("/ws?cmd=SET {} BRI <v>", id),
        },
        GuideCommand {
            label: "Color temp (2000-6500K)",
            command: format!("/ws?cmd=SET {} CT <v>", id),
        },
    ]
}

fn default_backup_path(backup: &MappingsBackup) -> PathBuf {
    PathBuf::from(format!(
        "mappings-backup-{}.json",
        backup.created_at.format("%Y-%m-%d")
    ))
}

fn write_backup(path: &Path, backup: &MappingsBackup) -> Result<()> {
    let content = serde_json::to_string_pretty(backup).context("Failed to encode backup")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write backup file: {}", path.display()))
}

fn read_backup(path: &Path) -> Result<MappingsBackup> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read backup file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Not a valid mappings backup: {}", path.display()))
}
