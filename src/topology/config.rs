use std::{path::Path, time::Duration};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::network::hull::HULL_OFFSET;

/// How snapshots are applied to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DrawMode {
    /// Reconcile in place, keeping positions, collapse state and the open popup.
    Incremental,
    /// Throw the graph away and rebuild it from every snapshot.
    Redraw,
}

/// Engine configuration. Replaces the per-user UI preferences the view used to read
/// from cookies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub draw_mode: DrawMode,
    /// Networks start collapsed when first seen.
    pub collapse_by_default: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
    /// Synchronous layout steps run on the very first snapshot.
    pub initial_settle_ticks: usize,
    /// Synchronous layout steps run after expanding a network.
    pub expand_settle_ticks: usize,
    /// How long a pending deletion may stay unanswered before it is abandoned.
    #[serde(deserialize_with = "deserialize_duration")]
    pub deletion_timeout: Duration,
    pub hull_offset: f32,
    /// Prefix of the management URLs delete commands are addressed to.
    pub delete_base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            draw_mode: DrawMode::Incremental,
            collapse_by_default: false,
            poll_interval: Duration::from_secs(10),
            initial_settle_ticks: 20,
            expand_settle_ticks: 100,
            deletion_timeout: Duration::from_secs(120),
            hull_offset: HULL_OFFSET,
            delete_base_url: "/project".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Durations are written the human way in config files, e.g. `"10s"` or `"2m"`.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}
