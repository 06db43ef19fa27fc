//! Command-line arguments for the `mantle` tool.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use mantle_core::{BrushMode, MantleConfig};

#[derive(Parser, Debug)]
#[command(name = "mantle", about = "Procedural terrain with hydraulic erosion")]
pub struct Cli {
    /// Log debug output (RUST_LOG still wins when set).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a terrain and export heightmap, preview and placements.
    Generate(GenerateArgs),
    /// Load a saved terrain and export it.
    Load {
        name: String,
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
        #[command(flatten)]
        db: DbArgs,
    },
    /// List saved terrains.
    List {
        #[command(flatten)]
        db: DbArgs,
    },
    /// Delete a saved terrain.
    Delete {
        name: String,
        #[command(flatten)]
        db: DbArgs,
    },
    /// Write the default configuration as RON.
    InitConfig { path: PathBuf },
}

#[derive(Args, Debug)]
pub struct DbArgs {
    #[arg(long, env = "MANTLE_DB_URI", default_value = "mongodb://localhost:27017")]
    pub db_uri: String,

    #[arg(long, default_value = "mantle")]
    pub db_name: String,

    #[arg(long, default_value = "terrains")]
    pub collection: String,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// RON config file; command-line values override it.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, env = "MANTLE_SEED")]
    pub seed: Option<u32>,

    /// Grid resolution.
    #[arg(long, env = "MANTLE_MAP_SIZE")]
    pub map_size: Option<usize>,

    /// World width and depth.
    #[arg(long, env = "MANTLE_SCALE")]
    pub scale: Option<f64>,

    /// World height of the highest point.
    #[arg(long, env = "MANTLE_ELEVATION")]
    pub elevation: Option<f64>,

    /// Erosion droplets; 0 disables erosion.
    #[arg(long, env = "MANTLE_EROSION_ITER")]
    pub erosion_iter: Option<u32>,

    /// Grayscale image to use instead of noise.
    #[arg(long, env = "MANTLE_HEIGHTMAP_URL")]
    pub heightmap: Option<String>,

    /// Brush strokes applied after generation, as MODE:X:Z[:DELTA].
    #[arg(long = "paint")]
    pub strokes: Vec<PaintStroke>,

    #[arg(short, long, default_value = "out")]
    pub out: PathBuf,

    /// Save the result to MongoDB under this name.
    #[arg(long)]
    pub save: Option<String>,

    #[command(flatten)]
    pub db: DbArgs,
}

impl GenerateArgs {
    // Apply flag and environment overrides to a loaded config
    pub fn apply_overrides(&self, config: &mut MantleConfig) {
        let terrain = &mut config.terrain;
        if let Some(seed) = self.seed {
            terrain.seed = Some(seed);
        }
        if let Some(size) = self.map_size {
            terrain.map_size = size;
        }
        if let Some(scale) = self.scale {
            terrain.scale = scale;
        }
        if let Some(elevation) = self.elevation {
            terrain.elevation_scale = elevation;
        }
        if let Some(iterations) = self.erosion_iter {
            terrain.erosion.iterations = iterations;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaintStroke {
    pub mode: BrushMode,
    pub x: f64,
    pub z: f64,
    pub delta: f64,
}

impl FromStr for PaintStroke {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if !(3..=4).contains(&parts.len()) {
            bail!("expected MODE:X:Z[:DELTA], got {s:?}");
        }
        let number = |text: &str| -> anyhow::Result<f64> {
            text.trim()
                .parse()
                .with_context(|| format!("bad number {text:?} in {s:?}"))
        };
        let Ok(mode) = parts[0].parse::<BrushMode>();
        Ok(Self {
            mode,
            x: number(parts[1])?,
            z: number(parts[2])?,
            delta: match parts.get(3) {
                Some(d) => number(d)?,
                None => 1.0,
            },
        })
    }
}
