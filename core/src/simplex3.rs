use crate::NoiseGenerator;

// Skewing/unskewing factors for 3D
const F3: f64 = 1.0 / 3.0;
const G3: f64 = 1.0 / 6.0;

// Midpoints of the 12 edges of a cube
const GRAD3: [[f64; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

// Single-octave 3D simplex noise.
// The permutation table is the only state and is fixed at construction,
// so sampling is a pure function of (x, y, z).
#[derive(Debug, Clone)]
pub struct SimplexNoise3D {
    perm: [u8; 512],
}

impl SimplexNoise3D {
    // `rand` must yield values in [0, 1); it drives the Fisher-Yates shuffle
    pub fn new(mut rand: impl FnMut() -> f64) -> Self {
        let mut p = [0u8; 256];
        for (i, v) in p.iter_mut().enumerate() {
            *v = i as u8;
        }
        for i in (1..256).rev() {
            let j = (rand() * (i + 1) as f64).floor() as usize;
            p.swap(i, j.min(i));
        }
        // Doubled so corner hashing never has to wrap
        let mut perm = [0u8; 512];
        for i in 0..512 {
            perm[i] = p[i & 255];
        }
        Self { perm }
    }

    #[inline]
    fn hash(&self, i: usize, j: usize, k: usize) -> usize {
        let p = &self.perm;
        p[i + p[j + p[k] as usize] as usize] as usize % 12
    }

    #[inline]
    fn corner(t: f64, g: usize, x: f64, y: f64, z: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        let t2 = t * t;
        let [gx, gy, gz] = GRAD3[g];
        t2 * t2 * (gx * x + gy * y + gz * z)
    }

    // Raw noise, roughly in [-1, 1]
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        // Skew into simplex cell space
        let s = (x + y + z) * F3;
        let i = (x + s).floor();
        let j = (y + s).floor();
        let k = (z + s).floor();
        let t = (i + j + k) * G3;
        let x0 = x - i + t;
        let y0 = y - j + t;
        let z0 = z - k + t;

        // Which of the six tetrahedra are we in
        let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
            if y0 >= z0 {
                (1, 0, 0, 1, 1, 0)
            } else if x0 >= z0 {
                (1, 0, 0, 1, 0, 1)
            } else {
                (0, 0, 1, 1, 0, 1)
            }
        } else if y0 < z0 {
            (0, 0, 1, 0, 1, 1)
        } else if x0 < z0 {
            (0, 1, 0, 0, 1, 1)
        } else {
            (0, 1, 0, 1, 1, 0)
        };

        let x1 = x0 - i1 as f64 + G3;
        let y1 = y0 - j1 as f64 + G3;
        let z1 = z0 - k1 as f64 + G3;
        let x2 = x0 - i2 as f64 + 2.0 * G3;
        let y2 = y0 - j2 as f64 + 2.0 * G3;
        let z2 = z0 - k2 as f64 + 2.0 * G3;
        let x3 = x0 - 1.0 + 3.0 * G3;
        let y3 = y0 - 1.0 + 3.0 * G3;
        let z3 = z0 - 1.0 + 3.0 * G3;

        let ii = (i as i64 & 255) as usize;
        let jj = (j as i64 & 255) as usize;
        let kk = (k as i64 & 255) as usize;

        let n0 = Self::corner(
            0.6 - x0 * x0 - y0 * y0 - z0 * z0,
            self.hash(ii, jj, kk),
            x0,
            y0,
            z0,
        );
        let n1 = Self::corner(
            0.6 - x1 * x1 - y1 * y1 - z1 * z1,
            self.hash(ii + i1, jj + j1, kk + k1),
            x1,
            y1,
            z1,
        );
        let n2 = Self::corner(
            0.6 - x2 * x2 - y2 * y2 - z2 * z2,
            self.hash(ii + i2, jj + j2, kk + k2),
            x2,
            y2,
            z2,
        );
        let n3 = Self::corner(
            0.6 - x3 * x3 - y3 * y3 - z3 * z3,
            self.hash(ii + 1, jj + 1, kk + 1),
            x3,
            y3,
            z3,
        );

        32.0 * (n0 + n1 + n2 + n3)
    }
}

impl NoiseGenerator for SimplexNoise3D {
    fn get3(&self, x: f64, y: f64, z: f64) -> f64 {
        self.sample(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::SimplexNoise3D;
    use crate::NoiseGenerator;
    use crate::rng::Mulberry32;

    fn seeded(seed: u32) -> SimplexNoise3D {
        let mut rng = Mulberry32::new(seed);
        SimplexNoise3D::new(|| rng.next_f64())
    }

    #[test]
    fn simplex3_determinism() {
        let a = seeded(9999);
        let b = seeded(9999);
        for &(x, y, z) in &[(1.23, 4.56, 7.89), (-3.5, 0.25, 12.0), (100.1, -7.7, 0.0)] {
            assert_eq!(a.get3(x, y, z).to_bits(), b.get3(x, y, z).to_bits());
        }
    }

    #[test]
    fn simplex3_range() {
        let s = seeded(0);
        let mut rng = Mulberry32::new(77);
        for _ in 0..5000 {
            let x = rng.next_f64() * 200.0 - 100.0;
            let y = rng.next_f64() * 200.0 - 100.0;
            let z = rng.next_f64() * 200.0 - 100.0;
            let v = s.get3(x, y, z);
            assert!(v.is_finite());
            // "roughly" [-1, 1]: the 0.6 falloff radius lets peaks poke slightly past 1
            assert!(v.abs() <= 1.1, "value {} out of range", v);
        }
    }

    #[test]
    fn simplex3_zero_on_lattice_points() {
        // Every corner contribution vanishes at integer lattice points
        let s = seeded(5);
        assert_eq!(s.get3(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn simplex3_seeds_differ() {
        let a = seeded(1);
        let b = seeded(2);
        let diff = (0..50)
            .map(|i| {
                let x = i as f64 * 0.37;
                (a.get3(x, x * 0.5, 0.1) - b.get3(x, x * 0.5, 0.1)).abs()
            })
            .sum::<f64>();
        assert!(diff > 0.0);
    }

    #[test]
    fn simplex3_get2_is_z_zero_slice() {
        let s = seeded(42);
        assert_eq!(s.get2(0.3, 0.9), s.get3(0.3, 0.9, 0.0));
    }
}
