use rayon::prelude::*;

use crate::config::{NoiseSettings, NormalizeMode};
use crate::grid::Grid;
use crate::rng::{Rng, hash2, seed_u32};

const SALT_OCTAVE: u64 = 0x0C7A_5EED_F00D_0001;
const SALT_GRADIENT: u64 = 0x9AD1_E471_0000_BEEF;
/// Octave offsets stay well inside the range where f32 keeps sub-cell precision.
const OFFSET_RANGE: f32 = 10_000.0;

#[inline]
fn smootherstep(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// 2D gradient noise (Perlin-style), roughly in [-1, 1].
#[inline]
pub fn gradient_noise(x: f32, y: f32, seed: u32) -> f32 {
    let ix = x.floor() as i32;
    let iy = y.floor() as i32;
    let fx = x - ix as f32;
    let fy = y - iy as f32;
    let sx = smootherstep(fx);
    let sy = smootherstep(fy);

    #[inline]
    fn grad(hash: u32, dx: f32, dy: f32) -> f32 {
        // 16 evenly-spaced unit gradients (every 22.5°).
        match hash & 15 {
            0  =>  dx,
            1  =>  0.924 * dx + 0.383 * dy,
            2  =>  0.707 * (dx + dy),
            3  =>  0.383 * dx + 0.924 * dy,
            4  =>  dy,
            5  => -0.383 * dx + 0.924 * dy,
            6  =>  0.707 * (-dx + dy),
            7  => -0.924 * dx + 0.383 * dy,
            8  => -dx,
            9  => -0.924 * dx - 0.383 * dy,
            10 =>  0.707 * (-dx - dy),
            11 => -0.383 * dx - 0.924 * dy,
            12 => -dy,
            13 =>  0.383 * dx - 0.924 * dy,
            14 =>  0.707 * (dx - dy),
            _  =>  0.924 * dx - 0.383 * dy,
        }
    }

    let v00 = grad(hash2(ix, iy, seed), fx, fy);
    let v10 = grad(hash2(ix + 1, iy, seed), fx - 1.0, fy);
    let v01 = grad(hash2(ix, iy + 1, seed), fx, fy - 1.0);
    let v11 = grad(hash2(ix + 1, iy + 1, seed), fx - 1.0, fy - 1.0);

    let a = lerp(v00, v10, sx);
    let b = lerp(v01, v11, sx);
    (lerp(a, b, sy) * 1.414).clamp(-1.0, 1.0)
}

/// Per-octave sample offsets, derived from the noise seed plus the tile offset and centre.
fn octave_offsets(settings: &NoiseSettings, centre: [f32; 2]) -> Vec<[f32; 2]> {
    let mut rng = Rng::new(settings.seed_u64());
    (0..settings.octaves)
        .map(|_| {
            let ox = rng.range_f32(-OFFSET_RANGE, OFFSET_RANGE) + settings.offset[0] + centre[0];
            let oy = rng.range_f32(-OFFSET_RANGE, OFFSET_RANGE) - settings.offset[1] - centre[1];
            [ox, oy]
        })
        .collect()
}

impl NoiseSettings {
    fn seed_u64(&self) -> u64 {
        self.seed ^ SALT_OCTAVE
    }

    /// Sum of octave amplitudes: the largest magnitude the raw sum can reach.
    pub fn max_possible_height(&self) -> f32 {
        let mut amplitude = 1.0;
        let mut total = 0.0;
        for _ in 0..self.octaves {
            total += amplitude;
            amplitude *= self.persistence;
        }
        total
    }
}

/// Fractal noise tile of `size * size`, normalised to roughly [0, 1].
///
/// Sampling is centred on the tile so that changing `scale` zooms about the middle.
pub fn generate_noise_map(size: usize, settings: &NoiseSettings, centre: [f32; 2]) -> Grid<f32> {
    let mut map = Grid::<f32>::square(size);
    if size == 0 {
        return map;
    }

    let offsets = octave_offsets(settings, centre);
    let grad_seed = seed_u32(settings.seed, SALT_GRADIENT);
    let half = size as f32 / 2.0;
    let scale = settings.scale.max(0.01);

    map.data.par_chunks_mut(size).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut amplitude = 1.0;
            let mut frequency = 1.0;
            let mut sum = 0.0;
            for (i, off) in offsets.iter().enumerate() {
                let sx = (x as f32 - half + off[0]) / scale * frequency;
                let sy = (y as f32 - half + off[1]) / scale * frequency;
                sum += gradient_noise(sx, sy, grad_seed.wrapping_add(i as u32)) * amplitude;
                amplitude *= settings.persistence;
                frequency *= settings.lacunarity;
            }
            *out = sum;
        }
    });

    match settings.normalize_mode {
        NormalizeMode::Local => {
            let (lo, hi) = map.min_max();
            let range = hi - lo;
            for v in &mut map.data {
                *v = if range > f32::EPSILON { (*v - lo) / range } else { 0.0 };
            }
        }
        NormalizeMode::Global => {
            // Raw sums rarely approach the theoretical peak; 0.9 keeps the usable range wider.
            let peak = settings.max_possible_height() / 0.9;
            for v in &mut map.data {
                *v = ((*v + 1.0) / peak).max(0.0);
            }
        }
    }

    map
}
