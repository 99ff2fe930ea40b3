//! Session configuration loaded from TOML.

use manastorm_sim::TurnConfig;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "config/session.toml";

/// Tunables for a headless session run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wall-clock length of one turn in milliseconds.
    pub turn_length_ms: u64,
    /// Settle delay before the next turn is elected, in milliseconds.
    pub settle_delay_ms: u64,
    /// Element level regenerated at each turn change.
    pub element_regen: f64,
    /// Upper clamp for every element level.
    pub max_element: f64,
    /// Terrain width in cells.
    pub level_width: u32,
    /// Terrain height in cells.
    pub level_height: u32,
    /// Seed for the host's item and color rolls.
    pub seed: u64,
    /// Fixed ticks the headless runner executes.
    pub run_ticks: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_length_ms: 45_000,
            settle_delay_ms: 1_500,
            element_regen: 0.3,
            max_element: 2.0,
            level_width: 512,
            level_height: 256,
            seed: 0xC0FFEE,
            run_ticks: 1_200,
        }
    }
}

impl SessionConfig {
    /// Load configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<SessionConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    SessionConfig::default()
                }
            },
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                }
                SessionConfig::default()
            }
        }
    }

    /// Turn-machine parameters derived from this configuration.
    pub fn turn_config(&self) -> TurnConfig {
        TurnConfig {
            turn_length: self.turn_length_ms / manastorm_core::TICK_MS,
            settle_delay: self.settle_delay_ms / manastorm_core::TICK_MS,
            element_regen: self.element_regen,
            max_element: self.max_element,
        }
    }
}
