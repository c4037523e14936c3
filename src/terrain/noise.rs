//! Seeded 2D simplex noise for procedural terrain.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GRAD3: [[f64; 2]; 12] = [
    [1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [-1.0, -1.0],
    [1.0, 0.0],
    [-1.0, 0.0],
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
    [0.0, 1.0],
    [0.0, -1.0],
];

/// Simplex noise over a permutation table drawn from a seeded RNG.
///
/// The table is filled with independent draws in `0..256` rather than a
/// shuffle, so some lattice gradients repeat. Terrain made with the same seed
/// is identical across runs.
#[derive(Clone)]
pub struct SimplexNoise {
    perm: [u8; 512],
}

impl SimplexNoise {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut p = [0u8; 256];
        for slot in p.iter_mut() {
            *slot = rng.gen_range(0..256u32) as u8;
        }
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = p[i & 255];
        }
        Self { perm }
    }

    fn perm(&self, index: usize) -> usize {
        self.perm[index] as usize
    }

    /// Noise value in roughly [-1, 1].
    pub fn noise2d(&self, xin: f64, yin: f64) -> f64 {
        let f2 = 0.5 * (3.0f64.sqrt() - 1.0);
        let g2 = (3.0 - 3.0f64.sqrt()) / 6.0;

        let s = (xin + yin) * f2;
        let i = (xin + s).floor();
        let j = (yin + s).floor();
        let t = (i + j) * g2;
        let x0 = xin - (i - t);
        let y0 = yin - (j - t);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - i1 as f64 + g2;
        let y1 = y0 - j1 as f64 + g2;
        let x2 = x0 - 1.0 + 2.0 * g2;
        let y2 = y0 - 1.0 + 2.0 * g2;

        let ii = (i as i64 & 255) as usize;
        let jj = (j as i64 & 255) as usize;
        let gi0 = self.perm(ii + self.perm(jj)) % 12;
        let gi1 = self.perm(ii + i1 + self.perm(jj + j1)) % 12;
        let gi2 = self.perm(ii + 1 + self.perm(jj + 1)) % 12;

        corner(gi0, x0, y0) + corner(gi1, x1, y1) + corner(gi2, x2, y2)
    }

    /// Sum of `octaves` layers, halving amplitude and doubling frequency.
    pub fn fractal(&self, x: f64, y: f64, base_frequency: f64, octaves: u32) -> f64 {
        let mut height = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        for _ in 0..octaves {
            height += amplitude
                * self.noise2d(
                    x * frequency * base_frequency,
                    y * frequency * base_frequency,
                );
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        height
    }
}

impl std::fmt::Debug for SimplexNoise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimplexNoise").finish_non_exhaustive()
    }
}

fn corner(gradient: usize, x: f64, y: f64) -> f64 {
    let t = 0.5 - x * x - y * y;
    if t < 0.0 {
        return 0.0;
    }
    let g = GRAD3[gradient];
    // 70 brings the summed corners back to roughly [-1, 1].
    70.0 * t.powi(4) * (g[0] * x + g[1] * y)
}
