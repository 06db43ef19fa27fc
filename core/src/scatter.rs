// Placement planning shared by the foliage and actor managers.
// Planning is pure: it reads a height field and draws from a PRNG, and
// returns world-space placements. The managers turn placements into
// backend instances.

use std::f64::consts::TAU;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::backend::{InstanceTransform, SceneBackend};
use crate::field::HeightField;
use crate::rng::Mulberry32;
use crate::terrain::TerrainGenerator;

// Slope is |gradient| in world units per cell, divided by this and capped at 1
const SLOPE_DIVISOR: f64 = 2.0;

// Density and filter settings for one scatter layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterRule {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    // Candidates per grid cell; `floor(map_size² × density)` are drawn.
    pub density: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    // Rotation about Y, radians.
    pub min_rotation: f64,
    pub max_rotation: f64,
    // Accepted normalized height range, inclusive.
    pub height_min: f64,
    pub height_max: f64,
    // Accepted slope range in [0, 1], inclusive.
    pub slope_min: f64,
    pub slope_max: f64,
    // Asset to load as the instance template when none is attached.
    pub mesh_url: Option<String>,
    // Fixed placement seed; placement is nondeterministic without one.
    pub seed: Option<u32>,
}

impl Default for ScatterRule {
    fn default() -> Self {
        Self {
            id: "layer".into(),
            name: "Foliage Layer".into(),
            enabled: true,
            density: 0.01,
            min_scale: 0.8,
            max_scale: 1.2,
            min_rotation: 0.0,
            max_rotation: TAU,
            height_min: 0.0,
            height_max: 1.0,
            slope_min: 0.0,
            slope_max: 1.0,
            mesh_url: None,
            seed: None,
        }
    }
}

impl ScatterRule {
    pub fn actor_default() -> Self {
        Self {
            id: "actor".into(),
            name: "Actor Layer".into(),
            density: 0.005,
            min_scale: 0.5,
            max_scale: 1.5,
            ..Self::default()
        }
    }

    pub fn accepts(&self, height: f64, slope: f64) -> bool {
        height >= self.height_min
            && height <= self.height_max
            && slope >= self.slope_min
            && slope <= self.slope_max
    }
}

// One accepted candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    // Candidate number within the pass, used for instance names.
    pub index: usize,
    pub cell: (usize, usize),
    pub position: DVec3,
    pub scale: f64,
    pub rotation_y: f64,
}

fn neighbours(field: &HeightField, x: usize, z: usize) -> (f64, f64, f64) {
    let last = field.size() - 1;
    let h = field.get(x, z) as f64;
    let hx = field.get((x + 1).min(last), z) as f64;
    let hz = field.get(x, (z + 1).min(last)) as f64;
    (h, hx, hz)
}

// Forward-difference slope at a cell, normalized into [0, 1]
pub fn slope_at(field: &HeightField, x: usize, z: usize, elevation_scale: f64) -> f64 {
    let (h, hx, hz) = neighbours(field, x, z);
    let dx = (hx - h) * elevation_scale;
    let dz = (hz - h) * elevation_scale;
    ((dx * dx + dz * dz).sqrt() / SLOPE_DIVISOR).min(1.0)
}

// Unit surface normal at a cell from its +x and +z neighbours
pub fn surface_normal(
    field: &HeightField,
    x: usize,
    z: usize,
    scale: f64,
    elevation_scale: f64,
) -> DVec3 {
    let (h, hx, hz) = neighbours(field, x, z);
    let step = scale / field.size() as f64;
    let along_x = DVec3::new(step, (hx - h) * elevation_scale, 0.0);
    let along_z = DVec3::new(0.0, (hz - h) * elevation_scale, step);
    along_z.cross(along_x).try_normalize().unwrap_or(DVec3::Y)
}

// Draw `floor(size² × density)` candidates and keep those passing the
// height and slope filters. Scale and rotation are drawn only for accepted
// candidates, after their (u, v).
pub fn plan_scatter(
    field: &HeightField,
    rule: &ScatterRule,
    scale: f64,
    elevation_scale: f64,
    rng: &mut Mulberry32,
) -> Vec<Placement> {
    let size = field.size();
    if size == 0 {
        return Vec::new();
    }
    let span = (size - 1) as f64;
    let half = scale / 2.0;
    let candidates = ((size * size) as f64 * rule.density).floor().max(0.0) as usize;

    let mut placements = Vec::new();
    for index in 0..candidates {
        let u = rng.next_f64();
        let v = rng.next_f64();
        let cx = (u * span).floor() as usize;
        let cz = (v * span).floor() as usize;

        let height = field.get(cx, cz) as f64;
        if height < rule.height_min || height > rule.height_max {
            continue;
        }
        let slope = slope_at(field, cx, cz, elevation_scale);
        if slope < rule.slope_min || slope > rule.slope_max {
            continue;
        }

        let s = rule.min_scale + rng.next_f64() * (rule.max_scale - rule.min_scale);
        let rot = rule.min_rotation + rng.next_f64() * (rule.max_rotation - rule.min_rotation);
        placements.push(Placement {
            index,
            cell: (cx, cz),
            position: DVec3::new(u * scale - half, height * elevation_scale, v * scale - half),
            scale: s,
            rotation_y: rot,
        });
    }
    placements
}

// A scatter rule plus the instances it placed.
// Instances are owned by the layer and disposed before every re-scatter.
// A mesh loaded from `rule.mesh_url` becomes the template for later passes.
pub struct ScatterLayer<B: SceneBackend> {
    pub rule: ScatterRule,
    template: Option<B::Mesh>,
    instances: Vec<B::Instance>,
    rng: Option<Mulberry32>,
}

impl<B: SceneBackend> ScatterLayer<B> {
    pub fn new(rule: ScatterRule) -> Self {
        let rng = rule.seed.map(Mulberry32::new);
        Self {
            rule,
            template: None,
            instances: Vec::new(),
            rng,
        }
    }

    pub fn with_template(mut self, mesh: B::Mesh) -> Self {
        self.template = Some(mesh);
        self
    }

    pub fn id(&self) -> &str {
        &self.rule.id
    }

    pub fn template(&self) -> Option<&B::Mesh> {
        self.template.as_ref()
    }

    pub fn instances(&self) -> &[B::Instance] {
        &self.instances
    }

    // Restart placement from `seed`
    pub fn set_seed(&mut self, seed: u32) {
        self.rule.seed = Some(seed);
        self.rng = Some(Mulberry32::new(seed));
    }

    pub fn clear(&mut self, backend: &B) {
        for inst in self.instances.drain(..) {
            backend.dispose_instance(inst);
        }
    }

    async fn resolve_template(&mut self, backend: &B) -> Option<B::Mesh> {
        if let Some(mesh) = &self.template {
            return Some(mesh.clone());
        }
        let url = self.rule.mesh_url.as_deref()?;
        match backend.load_mesh(url).await {
            Ok(Some(mesh)) => {
                self.template = Some(mesh.clone());
                Some(mesh)
            }
            Ok(None) => {
                log::warn!("layer {}: {url} holds no mesh", self.rule.id);
                None
            }
            Err(e) => {
                log::warn!("layer {}: failed to load {url}: {e}", self.rule.id);
                None
            }
        }
    }

    // Replace this layer's instances with a fresh pass over the terrain.
    // Returns the number placed. Layers without a template or mesh URL, and
    // terrains without a field, are skipped.
    pub async fn scatter(
        &mut self,
        terrain: &TerrainGenerator<B>,
        prefix: &str,
        align_to_surface: bool,
    ) -> usize {
        let Some(field) = terrain.field() else {
            return 0;
        };
        if self.template.is_none() && self.rule.mesh_url.is_none() {
            log::debug!("layer {}: no mesh to scatter", self.rule.id);
            return 0;
        }
        let backend = terrain.backend().clone();
        self.clear(&backend);
        let Some(template) = self.resolve_template(&backend).await else {
            return 0;
        };

        let mut unseeded;
        let rng = match self.rng.as_mut() {
            Some(rng) => rng,
            None => {
                unseeded = Mulberry32::from_entropy();
                &mut unseeded
            }
        };
        let (scale, elevation) = (terrain.scale(), terrain.elevation_scale());
        let placements = plan_scatter(field, &self.rule, scale, elevation, rng);

        for p in &placements {
            let up = if align_to_surface {
                surface_normal(field, p.cell.0, p.cell.1, scale, elevation)
            } else {
                DVec3::Y
            };
            let transform = InstanceTransform {
                position: p.position,
                scale: p.scale,
                rotation_y: p.rotation_y,
                up,
            };
            let name = format!("{prefix}_{}_{}", self.rule.id, p.index);
            let inst = backend.create_instance(&template, &name, &transform, terrain.mesh());
            self.instances.push(inst);
        }
        log::debug!("layer {}: placed {} instances", self.rule.id, placements.len());
        placements.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoiseParams;
    use crate::heightmap::HeightMapGenerator;

    fn hilly(size: usize) -> HeightField {
        HeightMapGenerator::new(NoiseParams::default(), 77).generate(size)
    }

    #[test]
    fn flat_field_has_zero_slope_and_up_normal() {
        let f = HeightField::flat(8);
        assert_eq!(slope_at(&f, 3, 3, 10.0), 0.0);
        assert_eq!(surface_normal(&f, 3, 3, 8.0, 10.0), DVec3::Y);
    }

    #[test]
    fn slope_is_capped() {
        let mut f = HeightField::flat(4);
        f.set(2, 1, 1.0);
        assert_eq!(slope_at(&f, 1, 1, 10.0), 1.0);
        // Last column compares with itself along x
        assert_eq!(slope_at(&f, 3, 3, 10.0), 0.0);
    }

    #[test]
    fn normal_tilts_away_from_rising_x() {
        let mut f = HeightField::flat(4);
        f.set(2, 1, 0.5);
        let n = surface_normal(&f, 1, 1, 4.0, 1.0);
        assert!((n.length() - 1.0).abs() < 1e-12);
        assert!(n.x < 0.0);
        assert!(n.y > 0.0);
        assert_eq!(n.z, 0.0);
    }

    #[test]
    fn candidate_count_follows_density() {
        let f = HeightField::flat(10);
        let rule = ScatterRule {
            density: 0.25,
            ..ScatterRule::default()
        };
        let placed = plan_scatter(&f, &rule, 10.0, 5.0, &mut Mulberry32::new(1));
        assert_eq!(placed.len(), 25);
    }

    #[test]
    fn height_filter_rejects_everything_below_range() {
        let f = HeightField::from_vec(16, vec![0.5; 256]).unwrap();
        let rule = ScatterRule {
            density: 1.0,
            height_min: 0.9,
            height_max: 1.0,
            ..ScatterRule::default()
        };
        let placed = plan_scatter(&f, &rule, 10.0, 5.0, &mut Mulberry32::new(3));
        assert!(placed.is_empty());
    }

    #[test]
    fn placements_respect_filters_and_ranges() {
        let f = hilly(64);
        let rule = ScatterRule {
            density: 0.5,
            height_min: 0.3,
            height_max: 0.7,
            slope_max: 0.4,
            min_scale: 2.0,
            max_scale: 3.0,
            ..ScatterRule::default()
        };
        let placed = plan_scatter(&f, &rule, 20.0, 10.0, &mut Mulberry32::new(8));
        assert!(!placed.is_empty());
        for p in &placed {
            let (x, z) = p.cell;
            let h = f.get(x, z) as f64;
            assert!(rule.accepts(h, slope_at(&f, x, z, 10.0)));
            assert_eq!(p.position.y, h * 10.0);
            assert!(p.position.x >= -10.0 && p.position.x < 10.0);
            assert!(p.scale >= 2.0 && p.scale < 3.0);
            assert!(p.rotation_y >= 0.0 && p.rotation_y < TAU);
        }
    }

    #[test]
    fn planning_is_seeded() {
        let f = hilly(32);
        let rule = ScatterRule::default();
        let a = plan_scatter(&f, &rule, 20.0, 10.0, &mut Mulberry32::new(4));
        let b = plan_scatter(&f, &rule, 20.0, 10.0, &mut Mulberry32::new(4));
        assert_eq!(a, b);
    }
}
