//! Command handlers

use anyhow::{bail, Result};
use clap::Args;

pub mod bridge;
pub mod config;
pub mod device;
pub mod group;
pub mod mapping;
pub mod scene;
pub mod status;
pub mod watch;

/// Power and brightness flags shared by `light set` and `group set`
#[derive(Args, Debug, Clone, Default)]
pub struct PowerArgs {
    /// Switch on
    #[arg(long, conflicts_with = "off")]
    pub on: bool,

    /// Switch off
    #[arg(long)]
    pub off: bool,

    /// Brightness in percent (0-100)
    #[arg(short, long, value_name = "PERCENT")]
    pub brightness: Option<f64>,
}

impl PowerArgs {
    /// Requested power state, if any
    pub fn power(&self) -> Option<bool> {
        match (self.on, self.off) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Reject empty requests and out-of-range brightness
    pub fn validate(&self) -> Result<()> {
        if self.power().is_none() && self.brightness.is_none() {
            bail!("Nothing to change. Use --on, --off or --brightness.");
        }
        if let Some(b) = self.brightness {
            if !(0.0..=100.0).contains(&b) {
                bail!("Brightness must be between 0 and 100, got {}", b);
            }
        }
        Ok(())
    }

    /// Human description of the change, e.g. "on, 40%"
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(on) = self.power() {
            parts.push(if on { "on".to_string() } else { "off".to_string() });
        }
        if let Some(b) = self.brightness {
            parts.push(format!("{:.0}%", b));
        }
        parts.join(", ")
    }
}
