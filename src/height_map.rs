use rayon::prelude::*;

use crate::config::{ErosionSettings, HeightMapSettings};
use crate::erosion::ErosionEngine;
use crate::error::{PreviewError, Result};
use crate::falloff::generate_falloff_map;
use crate::grid::Grid;
use crate::noise::generate_noise_map;

/// A square height field plus the range used to normalise it.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightMap {
    pub values: Grid<f32>,
    pub min_value: f32,
    pub max_value: f32,
}

impl HeightMap {
    pub fn new(values: Grid<f32>, min_value: f32, max_value: f32) -> Self {
        Self { values, min_value, max_value }
    }

    pub fn size(&self) -> usize {
        self.values.w
    }

    /// Position of `v` inside the declared range, clamped to [0, 1].
    pub fn normalised(&self, v: f32) -> f32 {
        inverse_lerp(self.min_value, self.max_value, v)
    }
}

#[inline]
pub fn inverse_lerp(a: f32, b: f32, v: f32) -> f32 {
    if (b - a).abs() <= f32::EPSILON {
        return 0.0;
    }
    ((v - a) / (b - a)).clamp(0.0, 1.0)
}

/// Produces raw height values for a square tile.
pub trait HeightMapSource: Send {
    /// `size * size` values, row-major, roughly in [0, 1].
    fn generate(
        &mut self,
        size: usize,
        erosion: &ErosionSettings,
        settings: &HeightMapSettings,
        origin: [f32; 2],
    ) -> Vec<f32>;
}

/// Fractal-noise height source with optional edge falloff.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoiseHeightMapGenerator;

impl HeightMapSource for NoiseHeightMapGenerator {
    fn generate(
        &mut self,
        size: usize,
        _erosion: &ErosionSettings,
        settings: &HeightMapSettings,
        origin: [f32; 2],
    ) -> Vec<f32> {
        generate_height_map(size, settings, origin)
    }
}

/// Noise tile with the falloff field subtracted when enabled.
pub fn generate_height_map(size: usize, settings: &HeightMapSettings, origin: [f32; 2]) -> Vec<f32> {
    let mut map = generate_noise_map(size, &settings.noise, origin);
    if settings.use_falloff {
        let falloff = generate_falloff_map(size);
        map.data
            .par_iter_mut()
            .zip(falloff.data.par_iter())
            .for_each(|(v, f)| *v = (*v - f).clamp(0.0, 1.0));
    }
    map.data
}

fn to_grid(values: Vec<f32>, size: usize) -> Result<Grid<f32>> {
    let len = values.len();
    Grid::from_vec(values, size, size).ok_or(PreviewError::SizeMismatch { len, size })
}

/// Map each value through the height curve and scale by the multiplier.
pub fn apply_height_multiplier(values: &mut [f32], settings: &HeightMapSettings) {
    let curve = &settings.height_curve;
    let mult = settings.height_multiplier;
    values.par_iter_mut().for_each(|v| *v = curve.evaluate(*v) * mult);
}

/// Weather the tile with `engine`, then apply the height curve and multiplier.
pub fn apply_erosion_and_height_multiplier(
    values: Vec<f32>,
    size: usize,
    engine: &mut dyn ErosionEngine,
    erosion: &ErosionSettings,
    settings: &HeightMapSettings,
) -> Result<Vec<f32>> {
    let mut grid = to_grid(values, size)?;
    engine.erode(&mut grid, erosion);
    apply_height_multiplier(&mut grid.data, settings);
    Ok(grid.data)
}

/// Wrap raw values as a height map, taking the range from the data itself.
pub fn height_map_for_values(values: Vec<f32>, size: usize) -> Result<HeightMap> {
    let grid = to_grid(values, size)?;
    let (min_value, max_value) = grid.min_max();
    Ok(HeightMap::new(grid, min_value, max_value))
}
