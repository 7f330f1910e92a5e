//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use lightsync_core::models::{Group, Light, Mapping, Scene};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print any serializable value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to encode output: {}", e),
        }
    }

    /// Print a single light
    pub fn print_light(&self, light: &Light) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", light.id);
                println!("Name:        {}", light.name);
                if !light.light_type.is_empty() {
                    println!("Type:        {}", light.light_type);
                }
                if !light.product_name.is_empty() {
                    println!("Product:     {}", light.product_name);
                }
                println!("Power:       {}", on_off(light.state.on));
                println!("Brightness:  {:.0}%", light.state.brightness);
                if let Some(mirek) = light.state.color_temp {
                    println!("Color temp:  {} mirek", mirek);
                }
                if let Some(ref color) = light.state.color {
                    match color.hex_rgb {
                        Some(ref hex) => println!("Color:       {}", hex),
                        None => println!("Color:       xy({:.3}, {:.3})", color.xy[0], color.xy[1]),
                    }
                }
                println!(
                    "Reachable:   {}",
                    if light.state.reachable { "yes" } else { "no" }
                );
            }
            OutputFormat::Json => self.json(light),
            OutputFormat::Quiet => println!("{}", light.id),
        }
    }

    /// Print a list of lights
    pub fn print_lights(&self, lights: &[Light]) {
        match self.format {
            OutputFormat::Human => {
                if lights.is_empty() {
                    println!("No lights found.");
                    return;
                }
                for light in lights {
                    println!(
                        "{} | {} | {:>3} | {:>4.0}%{}",
                        pad(&light.id, 8),
                        pad(&truncate(&light.name, 30), 30),
                        on_off(light.state.on),
                        light.state.brightness,
                        if light.state.reachable {
                            ""
                        } else {
                            " (unreachable)"
                        }
                    );
                }
                println!("\n{} light(s)", lights.len());
            }
            OutputFormat::Json => self.json(lights),
            OutputFormat::Quiet => {
                for light in lights {
                    println!("{}", light.id);
                }
            }
        }
    }

    /// Print a list of groups
    pub fn print_groups(&self, groups: &[Group]) {
        match self.format {
            OutputFormat::Human => {
                if groups.is_empty() {
                    println!("No groups found.");
                    return;
                }
                for group in groups {
                    let power = if group.state.all_on {
                        "all on"
                    } else if group.state.any_on {
                        "some on"
                    } else {
                        "off"
                    };
                    println!(
                        "{} | {} | {:<5} | {:<7} | {} light(s)",
                        pad(&group.id, 8),
                        pad(&truncate(&group.name, 30), 30),
                        group.group_type.to_string(),
                        power,
                        group.lights.len()
                    );
                }
                println!("\n{} group(s)", groups.len());
            }
            OutputFormat::Json => self.json(groups),
            OutputFormat::Quiet => {
                for group in groups {
                    println!("{}", group.id);
                }
            }
        }
    }

    /// Print a list of scenes
    pub fn print_scenes(&self, scenes: &[Scene]) {
        match self.format {
            OutputFormat::Human => {
                if scenes.is_empty() {
                    println!("No scenes found.");
                    return;
                }
                for scene in scenes {
                    println!(
                        "{} | {} | group {}",
                        pad(&scene.id, 16),
                        pad(&truncate(&scene.name, 30), 30),
                        scene.group_id
                    );
                }
                println!("\n{} scene(s)", scenes.len());
            }
            OutputFormat::Json => self.json(scenes),
            OutputFormat::Quiet => {
                for scene in scenes {
                    println!("{}", scene.id);
                }
            }
        }
    }

    /// Print a single mapping
    pub fn print_mapping(&self, mapping: &Mapping) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", mapping.id);
                println!("Name:        {}", mapping.name);
                println!("Controller:  {}", mapping.loxone_id);
                println!("Target:      {} {}", mapping.hue_type, mapping.hue_id);
                println!(
                    "Enabled:     {}",
                    if mapping.enabled { "yes" } else { "no" }
                );
                if let Some(ref desc) = mapping.description {
                    println!("Description: {}", desc);
                }
            }
            OutputFormat::Json => self.json(mapping),
            OutputFormat::Quiet => println!("{}", mapping.id),
        }
    }

    /// Print a list of mappings
    pub fn print_mappings(&self, mappings: &[Mapping]) {
        match self.format {
            OutputFormat::Human => {
                if mappings.is_empty() {
                    println!("No mappings found.");
                    return;
                }
                for mapping in mappings {
                    println!(
                        "{} | {} | {} -> {} {}{}",
                        pad(&mapping.id, 8),
                        pad(&truncate(&mapping.name, 25), 25),
                        mapping.loxone_id,
                        mapping.hue_type,
                        mapping.hue_id,
                        if mapping.enabled { "" } else { " (disabled)" }
                    );
                }
                println!("\n{} mapping(s)", mappings.len());
            }
            OutputFormat::Json => self.json(mappings),
            OutputFormat::Quiet => {
                for mapping in mappings {
                    println!("{}", mapping.id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a failure that doesn't abort the command
    pub fn failure(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("✗ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "error", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// Truncate a string to max characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Left-align to a fixed width
fn pad(s: &str, width: usize) -> String {
    format!("{:<width$}", s, width = width)
}
