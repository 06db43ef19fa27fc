// Terrain generator: owns the height field and the mesh built from it.
// Painter and scatter managers borrow the generator per call; they read and
// mutate the same field. The mesh only follows the field when
// `construct_mesh`/`rebuild_mesh` is called.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use image::DynamicImage;

use crate::backend::{GroundOptions, MeshOptions, SceneBackend};
use crate::config::{ErosionParams, TerrainConfig};
use crate::erosion::{ErosionStats, HydraulicErosion};
use crate::error::{MantleError, Result};
use crate::field::{HeightField, uv_to_cell, world_to_uv};
use crate::heightmap::HeightMapGenerator;
use crate::rng::Mulberry32;

const MESH_NAME: &str = "mantle_terrain";
const MATERIAL_NAME: &str = "mantle_terrain_mat";

pub struct TerrainGenerator<B: SceneBackend> {
    backend: Arc<B>,
    config: TerrainConfig,
    seed: u32,
    rng: Mulberry32,
    height_map_gen: HeightMapGenerator,
    field: Option<HeightField>,
    mesh: Option<B::Mesh>,
    material: Option<B::Material>,
    // Default materials are ours to dispose, caller-supplied ones are not
    owns_material: bool,
}

impl<B: SceneBackend> TerrainGenerator<B> {
    pub fn new(backend: Arc<B>, config: TerrainConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let height_map_gen = HeightMapGenerator::new(config.noise.clone(), seed);
        let config = TerrainConfig {
            seed: Some(seed),
            ..config
        };
        Self {
            backend,
            config,
            seed,
            rng: Mulberry32::new(seed),
            height_map_gen,
            field: None,
            mesh: None,
            material: None,
            owns_material: false,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    // Settings in effect, with the resolved seed filled in
    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn erosion_params_mut(&mut self) -> &mut ErosionParams {
        &mut self.config.erosion
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn map_size(&self) -> usize {
        self.config.map_size
    }

    pub fn scale(&self) -> f64 {
        self.config.scale
    }

    pub fn elevation_scale(&self) -> f64 {
        self.config.elevation_scale
    }

    pub fn field(&self) -> Option<&HeightField> {
        self.field.as_ref()
    }

    pub fn field_mut(&mut self) -> Option<&mut HeightField> {
        self.field.as_mut()
    }

    pub fn mesh(&self) -> Option<&B::Mesh> {
        self.mesh.as_ref()
    }

    pub fn material(&self) -> Option<&B::Material> {
        self.material.as_ref()
    }

    pub fn generate_height_map(&mut self) -> &HeightField {
        let field = self.height_map_gen.generate(self.config.map_size);
        log::info!(
            "generated {0}x{0} height field (seed {1})",
            self.config.map_size,
            self.seed
        );
        self.field.insert(field)
    }

    // Decode an image through the backend and use its luma as heights
    pub async fn import_height_map_from_image(&mut self, url: &str) -> Result<&HeightField> {
        let img = self.backend.decode_image(url).await?;
        log::info!("imported height field from {url}");
        Ok(self.import_height_map_from_dynamic(&img))
    }

    pub fn import_height_map_from_dynamic(&mut self, img: &DynamicImage) -> &HeightField {
        let field = HeightField::from_image(img, self.config.map_size);
        self.field.insert(field)
    }

    // Copy a raw row-major array; must hold exactly `map_size²` values
    pub fn import_height_map_from_array(&mut self, heights: &[f32]) -> Result<&HeightField> {
        let field = HeightField::from_vec(self.config.map_size, heights.to_vec())?;
        Ok(&*self.field.insert(field))
    }

    // Hydraulic erosion; `iterations` defaults to the configured count
    pub fn erode(&mut self, iterations: Option<u32>) -> Result<ErosionStats> {
        self.erode_inner(iterations, None)
    }

    // Same as `erode`, stopping between droplets once `cancel` is set
    pub fn erode_with_cancel(
        &mut self,
        iterations: Option<u32>,
        cancel: &AtomicBool,
    ) -> Result<ErosionStats> {
        self.erode_inner(iterations, Some(cancel))
    }

    fn erode_inner(
        &mut self,
        iterations: Option<u32>,
        cancel: Option<&AtomicBool>,
    ) -> Result<ErosionStats> {
        let field = self.field.as_mut().ok_or(MantleError::NoHeightField)?;
        let iterations = iterations.unwrap_or(self.config.erosion.iterations);
        let erosion = HydraulicErosion::new(self.config.erosion.clone());
        let stats = erosion.run(field, &mut self.rng, iterations, cancel);
        log::info!(
            "erosion: {} droplets, eroded {:.4}, deposited {:.4}{}",
            stats.droplets,
            stats.eroded,
            stats.deposited,
            if stats.cancelled { " (cancelled)" } else { "" }
        );
        Ok(stats)
    }

    // Build the ground mesh from the current field.
    // Waits for the backend's ready signal for at most the configured
    // timeout, then finishes with whatever mesh exists.
    pub async fn construct_mesh(&mut self, options: MeshOptions<B::Material>) -> Result<B::Mesh> {
        let field = self.field.as_ref().ok_or(MantleError::NoHeightField)?;
        let heightmap = field.to_gray_image();
        let ground = GroundOptions {
            width: self.config.scale,
            depth: self.config.scale,
            subdivisions: options
                .subdivisions
                .unwrap_or(self.config.map_size.saturating_sub(1) as u32),
            min_height: options.min_height.unwrap_or(0.0),
            max_height: options.max_height.unwrap_or(self.config.elevation_scale),
            updatable: false,
        };

        if let Some(old) = self.mesh.take() {
            self.backend.dispose_mesh(&old);
        }

        let build = self.backend.build_ground(MESH_NAME, &heightmap, &ground);
        let mesh = build.mesh;
        self.backend.enable_collisions(&mesh);
        self.mesh = Some(mesh.clone());

        let timeout = Duration::from_millis(self.config.mesh_ready_timeout_ms);
        match tokio::time::timeout(timeout, build.ready).await {
            Ok(Ok(())) => log::debug!("terrain mesh ready"),
            Ok(Err(_)) => log::warn!("terrain mesh never signalled ready, using it as built"),
            Err(_) => log::warn!(
                "terrain mesh not ready after {} ms, using it as built",
                self.config.mesh_ready_timeout_ms
            ),
        }

        match options.material {
            Some(material) => self.set_material(material),
            None => self.apply_default_material(),
        }
        if options.receive_shadows {
            self.backend.set_receive_shadows(&mesh, true);
        }
        log::info!("constructed terrain mesh ({} subdivisions)", ground.subdivisions);
        Ok(mesh)
    }

    // Rebuild after painting with the current material; no-op without a mesh
    pub async fn rebuild_mesh(&mut self) -> Result<Option<B::Mesh>> {
        if self.mesh.is_none() {
            return Ok(None);
        }
        let options = MeshOptions {
            subdivisions: Some(self.config.map_size.saturating_sub(1) as u32),
            min_height: Some(0.0),
            max_height: Some(self.config.elevation_scale),
            material: self.material.clone(),
            receive_shadows: true,
        };
        self.construct_mesh(options).await.map(Some)
    }

    // Use a caller-supplied material; the caller keeps ownership of it.
    // Passing the current material back only reassigns it.
    pub fn set_material(&mut self, material: B::Material) {
        if let Some(mesh) = &self.mesh {
            self.backend.assign_material(mesh, &material);
        }
        if self.material.as_ref() == Some(&material) {
            return;
        }
        self.release_owned_material();
        self.material = Some(material);
        self.owns_material = false;
    }

    fn apply_default_material(&mut self) {
        self.release_owned_material();
        let material = self
            .backend
            .create_default_material(MATERIAL_NAME, self.config.scale / 4.0);
        if let Some(mesh) = &self.mesh {
            self.backend.assign_material(mesh, &material);
        }
        self.material = Some(material);
        self.owns_material = true;
    }

    fn release_owned_material(&mut self) {
        if self.owns_material {
            if let Some(old) = self.material.take() {
                self.backend.dispose_material(&old);
            }
            self.owns_material = false;
        }
    }

    // Elevation at the central cell, for spawning
    pub fn center_height(&self) -> Result<f64> {
        let field = self.field.as_ref().ok_or(MantleError::NoHeightField)?;
        if field.is_empty() {
            return Ok(0.0);
        }
        let c = field.size() / 2;
        Ok(field.get(c, c) as f64 * self.config.elevation_scale)
    }

    // Nearest-cell elevation under world (x, z); 0 outside the terrain
    pub fn height_at_world(&self, world_x: f64, world_z: f64) -> Result<f64> {
        let field = self.field.as_ref().ok_or(MantleError::NoHeightField)?;
        let (u, v) = world_to_uv(self.config.scale, world_x, world_z);
        Ok(match uv_to_cell(self.config.map_size, u, v) {
            Some((x, z)) => field.get(x, z) as f64 * self.config.elevation_scale,
            None => 0.0,
        })
    }

    pub fn dispose(&mut self) {
        if let Some(mesh) = self.mesh.take() {
            self.backend.dispose_mesh(&mesh);
        }
        self.release_owned_material();
        self.material = None;
        self.field = None;
    }
}
