// src/commands/mod.rs
//! Command handlers for the missionpack CLI

mod build;
mod extract;
mod inspect;
pub mod progress;

pub use build::cmd_build;
pub use extract::cmd_extract;
pub use inspect::{cmd_check, cmd_inspect};

use anyhow::{Context, Result};
use missionpack::EngineConfig;
use std::path::Path;

/// Load the engine configuration, falling back to defaults
pub fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => EngineConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
