// Droplet-based hydraulic erosion.
// Droplets are simulated one after another, each seeing the terrain left
// by the previous ones, so a fixed seed reproduces the result bit for bit.
// Brush cells that fall outside the grid are skipped and their share of
// the material is lost.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ErosionParams;
use crate::field::HeightField;
use crate::rng::Mulberry32;

// Step used for the finite-difference gradient, in grid units
const GRADIENT_STEP: f64 = 0.01;
// Share of eroded material the droplet actually picks up
const PICKUP_FACTOR: f64 = 0.3;
// Sediment evaporates slower than water
const SEDIMENT_EVAPORATION_FACTOR: f64 = 0.3;
const MIN_DIRECTION_LEN: f64 = 0.001;

// What one erosion pass did to the field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErosionStats {
    // Droplets simulated to completion or early exit.
    pub droplets: u32,
    // Material removed from in-bounds cells.
    pub eroded: f64,
    // Material added to in-bounds cells.
    pub deposited: f64,
    // The pass stopped early on request.
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy)]
struct BrushCell {
    dx: i64,
    dz: i64,
    // Weight already divided by the brush total
    share: f64,
}

struct Droplet {
    x: f64,
    z: f64,
    dir_x: f64,
    dir_z: f64,
    speed: f64,
    water: f64,
    sediment: f64,
}

pub struct HydraulicErosion {
    params: ErosionParams,
    brush: Vec<BrushCell>,
}

impl HydraulicErosion {
    pub fn new(params: ErosionParams) -> Self {
        let radius = params.erosion_radius.clamp(2, 8) as i64;
        let brush = build_brush(radius);
        Self { params, brush }
    }

    pub fn params(&self) -> &ErosionParams {
        &self.params
    }

    // Run `iterations` droplets, drawing spawn points from `rng`.
    // `cancel` is polled between droplets.
    pub fn run(
        &self,
        field: &mut HeightField,
        rng: &mut Mulberry32,
        iterations: u32,
        cancel: Option<&AtomicBool>,
    ) -> ErosionStats {
        let mut stats = ErosionStats::default();
        let size = field.size() as f64;

        for _ in 0..iterations {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                stats.cancelled = true;
                break;
            }
            let x = rng.next_f64() * (size - 2.0) + 0.5;
            let z = rng.next_f64() * (size - 2.0) + 0.5;
            self.simulate_droplet(field, x, z, &mut stats);
            stats.droplets += 1;
        }
        stats
    }

    fn simulate_droplet(&self, field: &mut HeightField, x: f64, z: f64, stats: &mut ErosionStats) {
        let p = &self.params;
        let size = field.size() as i64;
        let mut d = Droplet {
            x,
            z,
            dir_x: 0.0,
            dir_z: 0.0,
            speed: 0.0,
            water: 1.0,
            sediment: 0.0,
        };

        for _ in 0..p.max_lifetime {
            let cell_x = d.x.floor() as i64;
            let cell_z = d.z.floor() as i64;
            // Stay one cell away from the edges so bilinear sampling is in range
            if cell_x < 1 || cell_x >= size - 2 || cell_z < 1 || cell_z >= size - 2 {
                break;
            }

            let height = field.sample_bilinear(d.x, d.z);
            let grad_x = (field.sample_bilinear(d.x + GRADIENT_STEP, d.z) - height) / GRADIENT_STEP;
            let grad_z = (field.sample_bilinear(d.x, d.z + GRADIENT_STEP) - height) / GRADIENT_STEP;

            d.dir_x = d.dir_x * p.inertia - grad_x * (1.0 - p.inertia);
            d.dir_z = d.dir_z * p.inertia - grad_z * (1.0 - p.inertia);
            let mut len = (d.dir_x * d.dir_x + d.dir_z * d.dir_z).sqrt();
            if len == 0.0 || !len.is_finite() {
                len = MIN_DIRECTION_LEN;
            }
            d.dir_x /= len;
            d.dir_z /= len;

            let next_x = d.x + d.dir_x;
            let next_z = d.z + d.dir_z;
            let delta_height = field.sample_bilinear(next_x, next_z) - height;

            // Speed grows going downhill and shrinks going uphill
            d.speed = (d.speed * d.speed - delta_height * p.gravity).max(0.0).sqrt();
            d.water *= 1.0 - p.evaporate_speed;
            d.sediment *= 1.0 - p.evaporate_speed * SEDIMENT_EVAPORATION_FACTOR;

            let capacity = (-delta_height).max(0.0) * d.speed * d.water * p.sediment_capacity_factor;

            if delta_height > 0.0 || d.sediment > capacity {
                let amount = if delta_height > 0.0 {
                    delta_height.min(d.sediment)
                } else {
                    (d.sediment - capacity) * p.deposit_speed
                };
                stats.deposited += self.apply_brush(field, d.x, d.z, amount);
                d.sediment -= amount;
            } else {
                let amount = ((capacity - d.sediment) * p.erode_speed).min(-delta_height);
                stats.eroded -= self.apply_brush(field, d.x, d.z, -amount);
                d.sediment += amount * PICKUP_FACTOR;
            }

            d.x = next_x;
            d.z = next_z;
        }
    }

    // Spread `amount` over the brush centred at (x, z); returns what landed
    // on the grid
    fn apply_brush(&self, field: &mut HeightField, x: f64, z: f64, amount: f64) -> f64 {
        let size = field.size() as i64;
        let cells = field.as_mut_slice();
        let mut applied = 0.0;
        for b in &self.brush {
            let bx = (x + b.dx as f64).floor() as i64;
            let bz = (z + b.dz as f64).floor() as i64;
            if bx < 0 || bx >= size || bz < 0 || bz >= size {
                continue;
            }
            let idx = (bz * size + bx) as usize;
            let before = cells[idx];
            let after = (before as f64 + amount * b.share) as f32;
            cells[idx] = after;
            applied += after as f64 - before as f64;
        }
        applied
    }
}

// Disc of cells strictly inside `radius`, weighted `1 - dist / radius`
// and normalized to sum to 1
fn build_brush(radius: i64) -> Vec<BrushCell> {
    let r = radius as f64;
    let mut raw = Vec::new();
    for dz in -radius..=radius {
        for dx in -radius..=radius {
            let dist_sq = (dx * dx + dz * dz) as f64;
            if dist_sq < r * r {
                raw.push((dx, dz, 1.0 - dist_sq.sqrt() / r));
            }
        }
    }
    let total: f64 = raw.iter().map(|&(_, _, w)| w).sum();
    let total = if total > 0.0 { total } else { 1.0 };
    raw.into_iter()
        .map(|(dx, dz, w)| BrushCell {
            dx,
            dz,
            share: w / total,
        })
        .collect()
}
