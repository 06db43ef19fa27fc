// The Mantle facade: one terrain plus its optional painter, foliage and
// actor collaborators, and the `generate` pipeline that drives them.

use std::sync::Arc;

use crate::actors::ActorScatterManager;
use crate::backend::{MeshOptions, SceneBackend};
use crate::config::MantleConfig;
use crate::error::Result;
use crate::foliage::FoliageLayerManager;
use crate::painting::TerrainPainter;
use crate::terrain::TerrainGenerator;

// Spawn clearance when the caller's player height is smaller
const MIN_SPAWN_CLEARANCE: f64 = 0.5;

// Inputs to `Mantle::generate`. Height source precedence is URL, then
// array, then procedural.
#[derive(Debug, Clone)]
pub struct GenerateOptions<Mat> {
    pub heightmap_url: Option<String>,
    pub heightmap_array: Option<Vec<f32>>,
    pub erode: bool,
    // Overrides the configured droplet count.
    pub erode_iterations: Option<u32>,
    pub mesh: MeshOptions<Mat>,
}

impl<Mat> Default for GenerateOptions<Mat> {
    fn default() -> Self {
        Self {
            heightmap_url: None,
            heightmap_array: None,
            erode: true,
            erode_iterations: None,
            mesh: MeshOptions::default(),
        }
    }
}

pub struct Mantle<B: SceneBackend> {
    pub terrain: TerrainGenerator<B>,
    pub painter: Option<TerrainPainter>,
    pub foliage: Option<FoliageLayerManager<B>>,
    pub actors: Option<ActorScatterManager<B>>,
}

impl<B: SceneBackend> Mantle<B> {
    pub fn new(backend: Arc<B>, config: &MantleConfig) -> Self {
        let terrain = TerrainGenerator::new(backend.clone(), config.terrain.clone());
        let painter = config.painting.as_ref().map(TerrainPainter::new);
        let foliage = config
            .foliage
            .as_ref()
            .map(|c| FoliageLayerManager::new(backend.clone(), c));
        let actors = config
            .actors
            .as_ref()
            .map(|c| ActorScatterManager::new(backend, c));
        Self {
            terrain,
            painter,
            foliage,
            actors,
        }
    }

    // Produce the height field, erode it, build the mesh, then scatter
    // foliage and actors over it.
    // A heightmap URL that fails to load falls back to the array, then to
    // procedural generation. A wrongly sized array is an error.
    pub async fn generate(&mut self, options: GenerateOptions<B::Material>) -> Result<B::Mesh> {
        let mut imported = false;
        if let Some(url) = options.heightmap_url.as_deref() {
            match self.terrain.import_height_map_from_image(url).await {
                Ok(_) => imported = true,
                Err(e) => log::warn!("{e}; generating procedurally instead"),
            }
        }
        if !imported {
            match options.heightmap_array.as_deref() {
                Some(heights) => {
                    self.terrain.import_height_map_from_array(heights)?;
                }
                None => {
                    self.terrain.generate_height_map();
                }
            }
        }

        let iterations = options
            .erode_iterations
            .unwrap_or(self.terrain.config().erosion.iterations);
        if options.erode && iterations > 0 {
            self.terrain.erode(Some(iterations))?;
        }

        let mesh = self.terrain.construct_mesh(options.mesh).await?;
        if let Some(foliage) = self.foliage.as_mut() {
            foliage.scatter_all(&self.terrain).await;
        }
        if let Some(actors) = self.actors.as_mut() {
            actors.scatter_all(&self.terrain).await;
        }
        Ok(mesh)
    }

    // Paint with the configured painter; false when painting is disabled
    pub fn paint_at(&mut self, world_x: f64, world_z: f64, delta: f64) -> bool {
        match &self.painter {
            Some(painter) => painter.paint_at(&mut self.terrain, world_x, world_z, delta),
            None => false,
        }
    }

    pub async fn rebuild_mesh(&mut self) -> Result<Option<B::Mesh>> {
        self.terrain.rebuild_mesh().await
    }

    // Height at which a player of `player_height` spawns over the centre
    pub fn spawn_height(&self, player_height: f64) -> Result<f64> {
        Ok(self.terrain.center_height()? + player_height.max(MIN_SPAWN_CLEARANCE))
    }

    pub fn dispose(&mut self) {
        self.terrain.dispose();
        if let Some(foliage) = self.foliage.as_mut() {
            foliage.dispose();
        }
        if let Some(actors) = self.actors.as_mut() {
            actors.dispose();
        }
    }
}
