use glam::Vec3;
use image::RgbaImage;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::TextureSettings;
use crate::height_map::{HeightMap, inverse_lerp};

/// Colour drawn where no texture layer has started yet.
const BASE_COLOUR: [f32; 3] = [0.5, 0.5, 0.5];
const SUN_DIR: Vec3 = Vec3::new(-0.45, 0.8, 0.4);
const AMBIENT: f32 = 0.35;

/// Layered terrain material, as the mesh shader would receive it.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TerrainMaterial {
    pub base_colours: Vec<[f32; 3]>,
    pub base_colour_strength: Vec<f32>,
    pub base_start_heights: Vec<f32>,
    pub base_blends: Vec<f32>,
    pub base_texture_scales: Vec<f32>,
    pub min_height: f32,
    pub max_height: f32,
}

impl TerrainMaterial {
    pub fn layer_count(&self) -> usize {
        self.base_colours.len()
    }

    pub fn update_mesh_heights(&mut self, min_height: f32, max_height: f32) {
        self.min_height = min_height;
        self.max_height = max_height;
    }

    /// Blend the layers for a world-space height.
    pub fn colour_at(&self, height: f32) -> [f32; 3] {
        let percent = inverse_lerp(self.min_height, self.max_height, height);
        let mut albedo = BASE_COLOUR;
        for i in 0..self.layer_count() {
            let half_blend = self.base_blends[i] / 2.0;
            let draw = inverse_lerp(-half_blend - 1e-4, half_blend, percent - self.base_start_heights[i]);
            let s = self.base_colour_strength[i];
            let tint = self.base_colours[i];
            for c in 0..3 {
                let layer = tint[c] * s + BASE_COLOUR[c] * (1.0 - s);
                albedo[c] = albedo[c] * (1.0 - draw) + layer * draw;
            }
        }
        albedo
    }
}

impl TextureSettings {
    /// Copy the layer table into the material. Height range is left alone.
    pub fn apply_to_material(&self, material: &mut TerrainMaterial) {
        material.base_colours = self.layers.iter().map(|l| l.tint).collect();
        material.base_colour_strength = self.layers.iter().map(|l| l.tint_strength).collect();
        material.base_start_heights = self.layers.iter().map(|l| l.start_height).collect();
        material.base_blends = self.layers.iter().map(|l| l.blend_strength).collect();
        material.base_texture_scales = self.layers.iter().map(|l| l.texture_scale).collect();
    }
}

#[inline]
fn to_rgba(c: [f32; 3], shade: f32) -> [u8; 4] {
    [
        (c[0] * shade * 255.0).round().clamp(0.0, 255.0) as u8,
        (c[1] * shade * 255.0).round().clamp(0.0, 255.0) as u8,
        (c[2] * shade * 255.0).round().clamp(0.0, 255.0) as u8,
        255,
    ]
}

/// Top-down render of a height map through the layered material, hill-shaded.
///
/// `cell_size` is the world distance between samples (the mesh scale).
pub fn render_material(height_map: &HeightMap, material: &TerrainMaterial, cell_size: f32) -> RgbaImage {
    let map = &height_map.values;
    let w = map.w;
    let mut img = RgbaImage::new(map.w as u32, map.h as u32);
    if w == 0 {
        return img;
    }
    let sun = SUN_DIR.normalize();

    img.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let (xi, yi) = (x as i32, y as i32);
            let dh_dx = (map.get_clamped(xi + 1, yi) - map.get_clamped(xi - 1, yi)) / (2.0 * cell_size);
            let dh_dz = (map.get_clamped(xi, yi - 1) - map.get_clamped(xi, yi + 1)) / (2.0 * cell_size);
            let normal = Vec3::new(-dh_dx, 1.0, -dh_dz).normalize();
            let shade = AMBIENT + (1.0 - AMBIENT) * normal.dot(sun).max(0.0);
            let colour = material.colour_at(map.get(x, y));
            row[x * 4..x * 4 + 4].copy_from_slice(&to_rgba(colour, shade));
        }
    });

    img
}
