use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::height_map::HeightMap;
use crate::rng::{hash2_unit, seed_u32};

const SALT_JITTER_X: u64 = 0x7E6E_7A7E_0000_0001;
const SALT_JITTER_Z: u64 = 0x7E6E_7A7E_0000_0002;
const SALT_DENSITY: u64 = 0x7E6E_7A7E_0000_0003;
const SALT_SPIN: u64 = 0x7E6E_7A7E_0000_0004;

/// Where the preview sits in the world. Spawned instances are placed relative to it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub translation: Vec3,
    /// Rotation about +Y, radians.
    pub yaw: f32,
    pub scale: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, yaw: 0.0, scale: 1.0 }
    }
}

impl Placement {
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        Quat::from_rotation_y(self.yaw) * (local * self.scale) + self.translation
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VegetationKind {
    Grass,
    Tree,
    Shrub,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VegetationInstance {
    pub kind: VegetationKind,
    pub position: Vec3,
    pub rotation: f32,
    pub scale: f32,
}

/// Populates a height map with vegetation.
pub trait VegetationSpawner: Send {
    fn spawn(&mut self, placement: &Placement, height_map: &HeightMap) -> Vec<VegetationInstance>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterSettings {
    pub seed: u64,
    /// Candidate spacing in map cells.
    pub spacing: usize,
    /// Fraction of a spacing step each candidate may wander.
    pub jitter: f32,
    /// Chance a suitable candidate actually spawns.
    pub density: f32,
    /// World distance between map cells; matches the mesh scale.
    pub cell_size: f32,
    /// Steepest rise per unit run that still holds vegetation.
    pub max_slope: f32,
    /// Normalised height below which nothing grows.
    pub water_level: f32,
    pub grass_until: f32,
    pub tree_until: f32,
    /// Above this only rock and snow.
    pub shrub_until: f32,
}

impl Default for ScatterSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            spacing: 4,
            jitter: 0.8,
            density: 0.6,
            cell_size: 2.5,
            max_slope: 1.2,
            water_level: 0.3,
            grass_until: 0.45,
            tree_until: 0.7,
            shrub_until: 0.85,
        }
    }
}

impl ScatterSettings {
    fn kind_for(&self, t: f32) -> Option<VegetationKind> {
        if t < self.water_level {
            None
        } else if t < self.grass_until {
            Some(VegetationKind::Grass)
        } else if t < self.tree_until {
            Some(VegetationKind::Tree)
        } else if t < self.shrub_until {
            Some(VegetationKind::Shrub)
        } else {
            None
        }
    }
}

/// Jittered-grid scatter filtered by height band and slope.
#[derive(Clone, Debug, Default)]
pub struct ScatterSpawner {
    pub settings: ScatterSettings,
}

impl ScatterSpawner {
    pub fn new(settings: ScatterSettings) -> Self {
        Self { settings }
    }
}

impl VegetationSpawner for ScatterSpawner {
    fn spawn(&mut self, placement: &Placement, height_map: &HeightMap) -> Vec<VegetationInstance> {
        let s = &self.settings;
        let map = &height_map.values;
        let size = map.w;
        if size < 3 {
            return Vec::new();
        }
        let step = s.spacing.max(1);
        let centre = (size - 1) as f32 / 2.0;
        let jitter_x = seed_u32(s.seed, SALT_JITTER_X);
        let jitter_z = seed_u32(s.seed, SALT_JITTER_Z);
        let density = seed_u32(s.seed, SALT_DENSITY);
        let spin = seed_u32(s.seed, SALT_SPIN);

        let mut out = Vec::new();
        for cy in (1..size - 1).step_by(step) {
            for cx in (1..size - 1).step_by(step) {
                let (ix, iy) = (cx as i32, cy as i32);
                if hash2_unit(ix, iy, density) >= s.density {
                    continue;
                }
                let fx = cx as f32 + (hash2_unit(ix, iy, jitter_x) - 0.5) * s.jitter * step as f32;
                let fy = cy as f32 + (hash2_unit(ix, iy, jitter_z) - 0.5) * s.jitter * step as f32;
                let fx = fx.clamp(0.0, (size - 1) as f32 - 1e-3);
                let fy = fy.clamp(0.0, (size - 1) as f32 - 1e-3);

                let (h, gx, gy) = map.height_and_gradient(fx, fy);
                let slope = (gx * gx + gy * gy).sqrt() / s.cell_size;
                if slope > s.max_slope {
                    continue;
                }
                let Some(kind) = s.kind_for(height_map.normalised(h)) else {
                    continue;
                };

                let local = Vec3::new((fx - centre) * s.cell_size, h, (centre - fy) * s.cell_size);
                let roll = hash2_unit(ix, iy, spin);
                out.push(VegetationInstance {
                    kind,
                    position: placement.transform_point(local),
                    rotation: roll * std::f32::consts::TAU,
                    scale: placement.scale * (0.8 + 0.4 * roll),
                });
            }
        }
        debug!(count = out.len(), "scattered vegetation");
        out
    }
}
