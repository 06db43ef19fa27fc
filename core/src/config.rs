// Serializable settings for every Mantle component, with RON persistence.
// Every struct is `#[serde(default)]`, so a config file only needs the
// fields it wants to change.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::painting::BrushMode;
use crate::scatter::ScatterRule;

// Errors raised while loading or saving a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write config: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] ron::error::SpannedError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[source] ron::Error),
}

// Multi-octave noise settings for height synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    // Number of summed noise layers.
    pub octaves: u32,
    // Amplitude multiplier per octave.
    pub persistence: f64,
    // Frequency multiplier per octave.
    pub lacunarity: f64,
    // Frequency of the first octave across the whole map.
    pub initial_scale: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            octaves: 7,
            persistence: 0.4,
            lacunarity: 2.0,
            initial_scale: 2.0,
        }
    }
}

// Droplet erosion tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionParams {
    // Droplets simulated per `erode` call unless overridden.
    pub iterations: u32,
    pub sediment_capacity_factor: f64,
    // Fraction of water lost per step.
    pub evaporate_speed: f64,
    // 0 = follow the slope exactly, 1 = never turn.
    pub inertia: f64,
    // Brush radius in cells, clamped to [2, 8] when used.
    pub erosion_radius: u32,
    pub deposit_speed: f64,
    pub erode_speed: f64,
    pub gravity: f64,
    // Steps before a droplet dies.
    pub max_lifetime: u32,
}

impl Default for ErosionParams {
    fn default() -> Self {
        Self {
            iterations: 80_000,
            sediment_capacity_factor: 3.0,
            evaporate_speed: 0.01,
            inertia: 0.1,
            erosion_radius: 3,
            deposit_speed: 0.3,
            erode_speed: 0.3,
            gravity: 4.0,
            max_lifetime: 30,
        }
    }
}

// Terrain generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    // Grid resolution; the height field holds `map_size²` cells.
    pub map_size: usize,
    // World-space width and depth.
    pub scale: f64,
    // World-space height of a normalized 1.0.
    pub elevation_scale: f64,
    // Fixed seed; a random one is drawn when absent.
    pub seed: Option<u32>,
    pub noise: NoiseParams,
    pub erosion: ErosionParams,
    // Upper bound on waiting for the backend's mesh-ready signal.
    pub mesh_ready_timeout_ms: u64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            map_size: 256,
            scale: 20.0,
            elevation_scale: 10.0,
            seed: None,
            noise: NoiseParams::default(),
            erosion: ErosionParams::default(),
            mesh_ready_timeout_ms: 3000,
        }
    }
}

// Brush settings for the terrain painter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PainterConfig {
    // Radius in grid cells.
    pub brush_radius: f64,
    pub brush_strength: f64,
    // 0 = flat-topped brush, 1 = smooth taper.
    pub brush_falloff: f64,
    pub mode: BrushMode,
    // Target for `flatten`.
    pub flatten_height: f64,
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            brush_radius: 5.0,
            brush_strength: 0.1,
            brush_falloff: 0.5,
            mode: BrushMode::Raise,
            flatten_height: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoliageGroupConfig {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub layers: Vec<ScatterRule>,
}

impl Default for FoliageGroupConfig {
    fn default() -> Self {
        Self {
            id: "group".into(),
            name: "Foliage Group".into(),
            enabled: true,
            layers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoliageConfig {
    // Cap on top-level entries (layers plus groups).
    pub max_layers: usize,
    pub layers: Vec<ScatterRule>,
    pub groups: Vec<FoliageGroupConfig>,
}

impl Default for FoliageConfig {
    fn default() -> Self {
        Self {
            max_layers: crate::foliage::MAX_LAYERS,
            layers: Vec::new(),
            groups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorLayerConfig {
    pub rule: ScatterRule,
    // Orient instances to the surface normal.
    pub align_to_surface: bool,
}

impl Default for ActorLayerConfig {
    fn default() -> Self {
        Self {
            rule: ScatterRule::actor_default(),
            align_to_surface: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorsConfig {
    pub layers: Vec<ActorLayerConfig>,
}

// Top-level settings. A `None` section disables that collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MantleConfig {
    pub terrain: TerrainConfig,
    pub painting: Option<PainterConfig>,
    pub foliage: Option<FoliageConfig>,
    pub actors: Option<ActorsConfig>,
}

impl Default for MantleConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainConfig::default(),
            painting: Some(PainterConfig::default()),
            foliage: Some(FoliageConfig::default()),
            actors: Some(ActorsConfig::default()),
        }
    }
}

impl MantleConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(ConfigError::Parse)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::Serialize)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config = Self::from_ron(&text)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_ron()?;
        std::fs::write(path, text).map_err(ConfigError::Write)
    }
}
