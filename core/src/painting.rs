// Brush-based editing of the terrain's height field.
// Painting mutates the field in place; the mesh is only refreshed by an
// explicit `rebuild_mesh`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backend::SceneBackend;
use crate::config::PainterConfig;
use crate::error::Result;
use crate::field::{HeightField, uv_to_cell, world_to_uv};
use crate::terrain::TerrainGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushMode {
    #[default]
    Raise,
    Lower,
    Flatten,
    Smooth,
    // Raise clamped to [0, 1]; any unrecognised mode name lands here
    #[serde(other)]
    Clamped,
}

impl FromStr for BrushMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "raise" => Self::Raise,
            "lower" => Self::Lower,
            "flatten" => Self::Flatten,
            "smooth" => Self::Smooth,
            _ => Self::Clamped,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerrainPainter {
    pub brush_radius: f64,
    pub brush_strength: f64,
    pub brush_falloff: f64,
    pub mode: BrushMode,
    pub flatten_height: f64,
}

impl Default for TerrainPainter {
    fn default() -> Self {
        Self::new(&PainterConfig::default())
    }
}

impl TerrainPainter {
    pub fn new(config: &PainterConfig) -> Self {
        Self {
            brush_radius: config.brush_radius,
            brush_strength: config.brush_strength,
            brush_falloff: config.brush_falloff,
            mode: config.mode,
            flatten_height: config.flatten_height,
        }
    }

    // Paint at world (x, z). Returns false when nothing was painted: no
    // field yet, or the point is off the terrain.
    pub fn paint_at<B: SceneBackend>(
        &self,
        terrain: &mut TerrainGenerator<B>,
        world_x: f64,
        world_z: f64,
        delta: f64,
    ) -> bool {
        let (u, v) = world_to_uv(terrain.scale(), world_x, world_z);
        self.paint_at_uv(terrain, u, v, delta)
    }

    pub fn paint_at_uv<B: SceneBackend>(
        &self,
        terrain: &mut TerrainGenerator<B>,
        u: f64,
        v: f64,
        delta: f64,
    ) -> bool {
        let Some(field) = terrain.field_mut() else {
            log::debug!("paint ignored: no height field");
            return false;
        };
        let Some((cx, cz)) = uv_to_cell(field.size(), u, v) else {
            log::debug!("paint ignored: ({u:.3}, {v:.3}) is off the terrain");
            return false;
        };
        self.paint_cell(field, cx, cz, delta);
        true
    }

    // Apply one dab of the brush centred on grid cell (cx, cz)
    pub fn paint_cell(&self, field: &mut HeightField, cx: usize, cz: usize, delta: f64) {
        let size = field.size() as i64;
        let radius = (self.brush_radius.floor() as i64).max(1);
        let strength = self.brush_strength * delta;
        let exponent = 1.0 + self.brush_falloff * 2.0;

        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let x = cx as i64 + dx;
                let z = cz as i64 + dz;
                if x < 0 || x >= size || z < 0 || z >= size {
                    continue;
                }
                let dist = ((dx * dx + dz * dz) as f64).sqrt() / radius as f64;
                if dist > 1.0 {
                    continue;
                }
                let w = (1.0 - dist.powf(exponent)) * strength;
                let (x, z) = (x as usize, z as usize);
                let h = field.get(x, z) as f64;

                let next = match self.mode {
                    BrushMode::Raise => (h + w).min(1.0),
                    BrushMode::Lower => (h - w).max(0.0),
                    BrushMode::Flatten => h + (self.flatten_height - h) * w,
                    BrushMode::Smooth => h + (neighbour_average(field, x, z) - h) * w,
                    BrushMode::Clamped => (h + w).clamp(0.0, 1.0),
                };
                field.set(x, z, next as f32);
            }
        }
    }

    pub async fn rebuild_mesh<B: SceneBackend>(
        &self,
        terrain: &mut TerrainGenerator<B>,
    ) -> Result<Option<B::Mesh>> {
        terrain.rebuild_mesh().await
    }
}

// Mean of the in-bounds 3×3 neighbourhood, centre included
fn neighbour_average(field: &HeightField, x: usize, z: usize) -> f64 {
    let size = field.size();
    let mut sum = 0.0;
    let mut count = 0;
    for nz in z.saturating_sub(1)..=(z + 1).min(size - 1) {
        for nx in x.saturating_sub(1)..=(x + 1).min(size - 1) {
            sum += field.get(nx, nz) as f64;
            count += 1;
        }
    }
    sum / count as f64
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{BrushMode, TerrainPainter};
    use crate::config::{PainterConfig, TerrainConfig};
    use crate::field::HeightField;
    use crate::headless::HeadlessScene;
    use crate::terrain::TerrainGenerator;

    fn painter(mode: BrushMode, strength: f64) -> TerrainPainter {
        TerrainPainter::new(&PainterConfig {
            brush_radius: 3.0,
            brush_strength: strength,
            brush_falloff: 0.5,
            mode,
            flatten_height: 0.5,
        })
    }

    fn terrain(size: usize, fill: f32) -> TerrainGenerator<HeadlessScene> {
        let config = TerrainConfig {
            map_size: size,
            scale: size as f64,
            seed: Some(1),
            ..TerrainConfig::default()
        };
        let mut t = TerrainGenerator::new(Arc::new(HeadlessScene::new()), config);
        t.import_height_map_from_array(&vec![fill; size * size]).unwrap();
        t
    }

    #[test]
    fn mode_names_parse() {
        assert_eq!("raise".parse::<BrushMode>().unwrap(), BrushMode::Raise);
        assert_eq!("Smooth".parse::<BrushMode>().unwrap(), BrushMode::Smooth);
        assert_eq!("sculpt".parse::<BrushMode>().unwrap(), BrushMode::Clamped);
    }

    #[test]
    fn raise_at_peak_stays_at_one() {
        let mut t = terrain(16, 1.0);
        for strength in [0.1, 1.0, 50.0] {
            assert!(painter(BrushMode::Raise, strength).paint_at_uv(&mut t, 0.5, 0.5, 1.0));
        }
        assert!(t.field().unwrap().as_slice().iter().all(|&h| h == 1.0));
    }

    #[test]
    fn raise_and_lower_stay_in_bounds() {
        let mut t = terrain(16, 0.5);
        let up = painter(BrushMode::Raise, 0.7);
        let down = painter(BrushMode::Lower, 0.9);
        for _ in 0..20 {
            up.paint_at_uv(&mut t, 0.4, 0.4, 1.0);
        }
        assert!(t.field().unwrap().as_slice().iter().all(|&h| h <= 1.0));
        for _ in 0..40 {
            down.paint_at_uv(&mut t, 0.6, 0.6, 1.0);
        }
        assert!(t.field().unwrap().as_slice().iter().all(|&h| h >= 0.0));
    }

    #[test]
    fn brush_centre_gets_full_weight() {
        let mut f = HeightField::flat(9);
        painter(BrushMode::Raise, 0.25).paint_cell(&mut f, 4, 4, 1.0);
        assert_eq!(f.get(4, 4), 0.25);
        // Ring at exactly the radius has zero falloff
        assert_eq!(f.get(7, 4), 0.0);
        assert!(f.get(5, 4) > 0.0 && f.get(5, 4) < 0.25);
        // Outside the disc
        assert_eq!(f.get(7, 7), 0.0);
    }

    #[test]
    fn flatten_approaches_target() {
        let mut f = HeightField::from_vec(9, vec![1.0; 81]).unwrap();
        let p = painter(BrushMode::Flatten, 0.5);
        p.paint_cell(&mut f, 4, 4, 1.0);
        assert_eq!(f.get(4, 4), 0.75);
        for _ in 0..30 {
            p.paint_cell(&mut f, 4, 4, 1.0);
        }
        assert!((f.get(4, 4) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn smooth_pulls_spike_down() {
        let mut f = HeightField::flat(9);
        f.set(4, 4, 0.9);
        painter(BrushMode::Smooth, 1.0).paint_cell(&mut f, 4, 4, 1.0);
        // Cells are smoothed in scan order, so earlier neighbours already
        // carry part of the spike when the centre is reached
        let centre = f.get(4, 4);
        assert!(centre > 0.1 && centre < 0.2, "centre {centre}");
        assert!(f.get(3, 3) > 0.0);
        assert!(f.get(5, 5) > 0.0);
    }

    #[test]
    fn clamped_mode_handles_negative_delta() {
        let mut f = HeightField::from_vec(5, vec![0.05; 25]).unwrap();
        painter(BrushMode::Clamped, 1.0).paint_cell(&mut f, 2, 2, -1.0);
        assert_eq!(f.get(2, 2), 0.0);
    }

    #[test]
    fn painting_off_terrain_is_a_no_op() {
        let mut t = terrain(8, 0.5);
        let p = painter(BrushMode::Raise, 0.5);
        assert!(!p.paint_at(&mut t, 100.0, 0.0, 1.0));
        assert!(!p.paint_at_uv(&mut t, -0.2, 0.5, 1.0));
        assert!(t.field().unwrap().as_slice().iter().all(|&h| h == 0.5));
    }

    #[test]
    fn painting_without_field_is_a_no_op() {
        let mut t = TerrainGenerator::new(Arc::new(HeadlessScene::new()), TerrainConfig::default());
        assert!(!TerrainPainter::default().paint_at(&mut t, 0.0, 0.0, 1.0));
    }

    #[test]
    fn painting_edges_clips_brush() {
        let mut t = terrain(8, 0.0);
        assert!(painter(BrushMode::Raise, 0.5).paint_at_uv(&mut t, 0.0, 0.0, 1.0));
        assert_eq!(t.field().unwrap().get(0, 0), 0.5);
    }

    #[tokio::test]
    async fn rebuild_without_mesh_is_a_no_op() {
        let mut t = terrain(8, 0.2);
        let p = TerrainPainter::default();
        assert!(p.rebuild_mesh(&mut t).await.unwrap().is_none());
    }
}
