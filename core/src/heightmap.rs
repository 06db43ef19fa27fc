use crate::NoiseGenerator;
use crate::config::NoiseParams;
use crate::field::HeightField;
use crate::rng::Mulberry32;
use crate::simplex3::SimplexNoise3D;

// Fractal (multi-octave) height synthesis over a 3D noise function.
// Holds parameters and the bound noise, never a height field.
pub struct HeightMapGenerator {
    params: NoiseParams,
    seed: u32,
    noise: Box<dyn NoiseGenerator + Send + Sync>,
}

impl HeightMapGenerator {
    // Simplex noise whose permutation table comes from mulberry32(seed)
    pub fn new(params: NoiseParams, seed: u32) -> Self {
        let mut rng = Mulberry32::new(seed);
        let noise = SimplexNoise3D::new(|| rng.next_f64());
        Self::with_noise(params, seed, Box::new(noise))
    }

    pub fn with_noise(
        params: NoiseParams,
        seed: u32,
        noise: Box<dyn NoiseGenerator + Send + Sync>,
    ) -> Self {
        Self {
            params,
            seed,
            noise,
        }
    }

    pub fn params(&self) -> &NoiseParams {
        &self.params
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    // Fractal sum at grid cell (x, y) of a `map_size` grid, before normalization
    fn raw_height(&self, x: usize, y: usize, map_size: usize) -> f64 {
        let seed = self.seed as f64;
        // Per-seed offsets keep different seeds away from each other's
        // neighbourhood in noise space
        let offset_x = seed * 0.01;
        let offset_y = seed * 0.01 + 1000.0;
        let z = seed * 0.001;

        let fx = x as f64 / map_size as f64;
        let fy = y as f64 / map_size as f64;

        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut height = 0.0;
        for _ in 0..self.params.octaves {
            let nx = fx * self.params.initial_scale * frequency + offset_x;
            let ny = fy * self.params.initial_scale * frequency + offset_y;
            height += self.noise.get3(nx, ny, z) * amplitude;
            amplitude *= self.params.persistence;
            frequency *= self.params.lacunarity;
        }
        height
    }

    // Generate a `map_size × map_size` field, min-max normalized so the
    // lowest cell is exactly 0 and the highest exactly 1
    pub fn generate(&self, map_size: usize) -> HeightField {
        let mut raw = Vec::with_capacity(map_size * map_size);
        for y in 0..map_size {
            for x in 0..map_size {
                raw.push(self.raw_height(x, y, map_size));
            }
        }

        let (min, max) = raw
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            });
        // A perfectly flat field normalizes to all zeros
        let range = if max > min { max - min } else { 1.0 };

        let data = raw.iter().map(|&h| ((h - min) / range) as f32).collect();
        HeightField::from_vec(map_size, data).unwrap_or_else(|_| HeightField::flat(map_size))
    }
}
