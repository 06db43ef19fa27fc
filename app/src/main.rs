mod cli;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use mantle_core::headless::InstanceRecord;
use mantle_core::preview::render_preview;
use mantle_core::{GenerateOptions, HeadlessScene, HeightField, Mantle, MantleConfig};
use mantle_storage::TerrainStore;
use mantle_storage::models::TerrainDoc;
use serde::Serialize;

use crate::cli::{Cli, Command, DbArgs, GenerateArgs};

#[derive(Serialize)]
struct PlacementRecord {
    name: String,
    mesh: String,
    position: [f64; 3],
    scale: f64,
    rotation_y: f64,
    up: [f64; 3],
}

impl From<&InstanceRecord> for PlacementRecord {
    fn from(r: &InstanceRecord) -> Self {
        Self {
            name: r.name.clone(),
            mesh: r.template.name.clone(),
            position: r.transform.position.to_array(),
            scale: r.transform.scale,
            rotation_y: r.transform.rotation_y,
            up: r.transform.up.to_array(),
        }
    }
}

// Heightmap PNG plus hillshaded colour preview
fn export_field(field: &HeightField, elevation_scale: f64, out: &Path) -> Result<()> {
    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let heightmap = out.join("heightmap.png");
    field
        .to_gray_image()
        .save(&heightmap)
        .with_context(|| format!("writing {}", heightmap.display()))?;
    let preview = out.join("preview.png");
    render_preview(field, elevation_scale)
        .save(&preview)
        .with_context(|| format!("writing {}", preview.display()))?;
    log::info!("wrote {} and {}", heightmap.display(), preview.display());
    Ok(())
}

async fn open_store(db: &DbArgs) -> Result<TerrainStore> {
    TerrainStore::init(&db.db_uri, &db.db_name, &db.collection)
        .await
        .with_context(|| format!("connecting to {}", db.db_uri))
}

async fn generate(args: GenerateArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => MantleConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MantleConfig::default(),
    };
    args.apply_overrides(&mut config);

    let scene = Arc::new(HeadlessScene::new());
    let mut mantle = Mantle::new(scene.clone(), &config);
    log::info!(
        "generating {0}x{0} terrain with seed {1}",
        config.terrain.map_size,
        mantle.terrain.seed()
    );

    let start = Instant::now();
    let options = GenerateOptions {
        heightmap_url: args.heightmap.clone(),
        ..GenerateOptions::default()
    };
    mantle.generate(options).await.context("terrain generation failed")?;
    log::info!("generated in {:.2} ms", start.elapsed().as_secs_f64() * 1000.0);

    if !args.strokes.is_empty() {
        match mantle.painter.clone() {
            Some(mut painter) => {
                for stroke in &args.strokes {
                    painter.mode = stroke.mode;
                    if !painter.paint_at(&mut mantle.terrain, stroke.x, stroke.z, stroke.delta) {
                        log::warn!("stroke at ({}, {}) is off the terrain", stroke.x, stroke.z);
                    }
                }
                mantle.rebuild_mesh().await?;
                // Scatter again so placements sit on the painted surface
                if let Some(foliage) = mantle.foliage.as_mut() {
                    foliage.scatter_all(&mantle.terrain).await;
                }
                if let Some(actors) = mantle.actors.as_mut() {
                    actors.scatter_all(&mantle.terrain).await;
                }
            }
            None => log::warn!("painting is disabled in the config, ignoring strokes"),
        }
    }

    let field = mantle
        .terrain
        .field()
        .context("generation produced no height field")?;
    export_field(field, mantle.terrain.elevation_scale(), &args.out)?;

    let placements: Vec<PlacementRecord> = scene.instances().iter().map(Into::into).collect();
    let placements_path = args.out.join("placements.json");
    fs::write(&placements_path, serde_json::to_string_pretty(&placements)?)
        .with_context(|| format!("writing {}", placements_path.display()))?;

    // Record the seed actually used so the run can be reproduced
    let mut used = config.clone();
    used.terrain = mantle.terrain.config().clone();
    used.save(&args.out.join("mantle.ron"))?;

    println!(
        "Generated terrain (seed {}), {} placements, spawn height {:.2}",
        mantle.terrain.seed(),
        placements.len(),
        mantle.spawn_height(0.0)?
    );

    if let Some(name) = &args.save {
        let doc = TerrainDoc::capture(name, &mantle.terrain)?;
        open_store(&args.db).await?.create(&doc).await?;
        println!("Saved to MongoDB as {name}");
    }
    mantle.dispose();
    Ok(())
}

async fn load(name: &str, out: &Path, db: &DbArgs) -> Result<()> {
    let store = open_store(db).await?;
    let Some(doc) = store.read_by_name(name).await? else {
        anyhow::bail!("no saved terrain named {name}");
    };
    let terrain = doc.to_terrain(Arc::new(HeadlessScene::new()))?;
    let field = terrain
        .field()
        .context("restored terrain has no height field")?;
    export_field(field, terrain.elevation_scale(), out)?;
    println!("Loaded {name} (seed {}, {}x{})", doc.seed, doc.map_size(), doc.map_size());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Generate(args) => generate(args).await,
        Command::Load { name, out, db } => load(&name, &out, &db).await,
        Command::List { db } => {
            for name in open_store(&db).await?.list_names().await? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Delete { name, db } => {
            if open_store(&db).await?.delete_by_name(&name).await? {
                println!("Deleted {name}");
            } else {
                println!("No saved terrain named {name}");
            }
            Ok(())
        }
        Command::InitConfig { path } => {
            MantleConfig::default().save(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}
