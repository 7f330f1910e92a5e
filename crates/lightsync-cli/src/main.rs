//! Lightsync CLI
//!
//! Command-line interface for the lighting gateway: bridge setup, light,
//! group and scene control, controller mappings and a live watch view.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use lightsync_core::models::ImportMode;
use lightsync_core::{ApiClient, Config};

mod commands;
mod output;

use commands::PowerArgs;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "lightsync")]
#[command(about = "Lightsync - control and watch lights through the gateway")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway health and bridge pairing status
    Status,
    /// Bridge setup
    Bridge {
        #[command(subcommand)]
        command: BridgeCommands,
    },
    /// List and control lights
    Light {
        #[command(subcommand)]
        command: LightCommands,
    },
    /// List and control groups (rooms and zones)
    Group {
        #[command(subcommand)]
        command: GroupCommands,
    },
    /// List and activate scenes
    Scene {
        #[command(subcommand)]
        command: SceneCommands,
    },
    /// Manage controller mappings
    Mapping {
        #[command(subcommand)]
        command: MappingCommands,
    },
    /// Print light changes as they happen (Ctrl-C to stop)
    Watch,
    /// Send a command over the push channel
    Send {
        /// Mapped target id
        target: String,
        /// Action name, e.g. "set"
        action: String,
        /// Parameters as key=value (value parsed as JSON when possible)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum BridgeCommands {
    /// Show whether a bridge is paired
    Show,
    /// Search the gateway's network for bridges
    Discover,
    /// Pair with a bridge (press its link button first)
    Pair {
        /// Bridge IP address
        ip: String,
    },
    /// Run DNS, port and HTTPS checks against a bridge
    Test {
        /// Bridge IP address
        ip: String,
    },
}

#[derive(Subcommand)]
enum LightCommands {
    /// List all lights
    #[command(alias = "ls")]
    List,
    /// Show light details
    Show {
        /// Light ID
        id: String,
    },
    /// Switch or dim a light
    Set {
        /// Light ID
        id: String,
        #[command(flatten)]
        power: PowerArgs,
    },
}

#[derive(Subcommand)]
enum GroupCommands {
    /// List all groups
    #[command(alias = "ls")]
    List,
    /// Switch or dim every light in a group
    Set {
        /// Group ID
        id: String,
        #[command(flatten)]
        power: PowerArgs,
    },
}

#[derive(Subcommand)]
enum SceneCommands {
    /// List all scenes
    #[command(alias = "ls")]
    List,
    /// Activate a scene
    Activate {
        /// Scene ID
        id: String,
    },
}

#[derive(Subcommand)]
enum MappingCommands {
    /// List all mappings
    #[command(alias = "ls")]
    List,
    /// Create a mapping
    #[command(alias = "add")]
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,
        /// Controller-side identifier
        #[arg(short = 'l', long)]
        loxone_id: String,
        /// Light, group or scene id on the bridge
        #[arg(long)]
        hue_id: String,
        /// light, group or scene
        #[arg(short = 't', long, default_value = "light")]
        hue_type: String,
        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
        /// Create the mapping disabled
        #[arg(long)]
        disabled: bool,
    },
    /// Update fields of a mapping
    Update {
        /// Mapping ID
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short = 'l', long)]
        loxone_id: Option<String>,
        #[arg(long)]
        hue_id: Option<String>,
        #[arg(short = 't', long)]
        hue_type: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
    /// Delete a mapping
    #[command(alias = "rm")]
    Delete {
        /// Mapping ID
        id: String,
    },
    /// Write all mappings to a backup file
    Export {
        /// Output file (default: mappings-backup-<date>.json)
        file: Option<PathBuf>,
    },
    /// Restore mappings from a backup file
    Import {
        /// Backup file
        file: PathBuf,
        /// replace or merge
        #[arg(short, long, default_value_t = ImportMode::Merge)]
        mode: ImportMode,
    },
    /// Show the controller commands for a mapping
    Guide {
        /// Mapping ID
        id: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (server_url, api_base, reconnect_interval_ms, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work even when the gateway is unreachable
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);
    debug!("Using gateway at {}", config.server_url);

    let client = ApiClient::new(config.clone()).context("Failed to create API client")?;

    match cli.command {
        Commands::Status => commands::status::show(&client, &output).await,
        Commands::Bridge { command } => handle_bridge_command(command, &client, &output).await,
        Commands::Light { command } => handle_light_command(command, client, &output).await,
        Commands::Group { command } => handle_group_command(command, client, &output).await,
        Commands::Scene { command } => handle_scene_command(command, client, &output).await,
        Commands::Mapping { command } => {
            handle_mapping_command(command, &client, &config, &output).await
        }
        Commands::Watch => commands::watch::watch(client, &config, &output).await,
        Commands::Send {
            target,
            action,
            params,
        } => commands::watch::send(&config, &target, &action, &params, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

async fn handle_bridge_command(
    command: BridgeCommands,
    client: &ApiClient,
    output: &Output,
) -> Result<()> {
    match command {
        BridgeCommands::Show => commands::bridge::show(client, output).await,
        BridgeCommands::Discover => commands::bridge::discover(client, output).await,
        BridgeCommands::Pair { ip } => commands::bridge::pair(client, &ip, output).await,
        BridgeCommands::Test { ip } => commands::bridge::test(client, &ip, output).await,
    }
}

async fn handle_light_command(
    command: LightCommands,
    client: ApiClient,
    output: &Output,
) -> Result<()> {
    match command {
        LightCommands::List => commands::device::list(&client, output).await,
        LightCommands::Show { id } => commands::device::show(&client, &id, output).await,
        LightCommands::Set { id, power } => commands::device::set(client, &id, &power, output).await,
    }
}

async fn handle_group_command(
    command: GroupCommands,
    client: ApiClient,
    output: &Output,
) -> Result<()> {
    match command {
        GroupCommands::List => commands::group::list(&client, output).await,
        GroupCommands::Set { id, power } => commands::group::set(client, &id, &power, output).await,
    }
}

async fn handle_scene_command(
    command: SceneCommands,
    client: ApiClient,
    output: &Output,
) -> Result<()> {
    match command {
        SceneCommands::List => commands::scene::list(&client, output).await,
        SceneCommands::Activate { id } => commands::scene::activate(client, &id, output).await,
    }
}

async fn handle_mapping_command(
    command: MappingCommands,
    client: &ApiClient,
    config: &Config,
    output: &Output,
) -> Result<()> {
    match command {
        MappingCommands::List => commands::mapping::list(client, output).await,
        MappingCommands::Create {
            name,
            loxone_id,
            hue_id,
            hue_type,
            description,
            disabled,
        } => {
            let mapping = commands::mapping::new_mapping(
                name,
                loxone_id,
                hue_id,
                &hue_type,
                description,
                !disabled,
            )?;
            commands::mapping::create(client, &mapping, output).await
        }
        MappingCommands::Update {
            id,
            name,
            loxone_id,
            hue_id,
            hue_type,
            description,
            enable,
            disable,
        } => {
            let enabled = match (enable, disable) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let update = commands::mapping::mapping_update(
                name,
                loxone_id,
                hue_id,
                hue_type.as_deref(),
                description,
                enabled,
            )?;
            commands::mapping::update(client, &id, &update, output).await
        }
        MappingCommands::Delete { id } => commands::mapping::delete(client, &id, output).await,
        MappingCommands::Export { file } => commands::mapping::export(client, file, output).await,
        MappingCommands::Import { file, mode } => {
            commands::mapping::import(client, &file, mode, output).await
        }
        MappingCommands::Guide { id } => {
            commands::mapping::guide(client, config, &id, output).await
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// Level comes from LIGHTSYNC_LOG, falling back to `log_level` in the
/// config. Logs go to `log_file` when set, otherwise stderr.
fn init_logging(config: &Config) {
    let log_level = std::env::var("LIGHTSYNC_LOG").unwrap_or_else(|_| config.log_level.clone());
    let env_filter = EnvFilter::try_new(format!(
        "lightsync_core={},lightsync_cli={}",
        log_level, log_level
    ))
    .unwrap_or_else(|_| EnvFilter::new("lightsync_core=info,lightsync_cli=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    // Ignore error if already initialized
    match config.log_file {
        Some(ref log_path) => {
            let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                    return;
                }
            };
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
}
