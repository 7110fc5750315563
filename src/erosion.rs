use tracing::debug;

use crate::config::ErosionSettings;
use crate::grid::Grid;
use crate::rng::Rng;

const SALT_DROPLET: u64 = 0xD80B_1E75_0000_0001;

/// Something that weathers a height map in place.
///
/// The map is square and carries a border of `settings.brush_radius`
/// cells on every side so the brush never has to clip inside the tile.
pub trait ErosionEngine: Send {
    fn erode(&mut self, map: &mut Grid<f32>, settings: &ErosionSettings);
}

/// One brush tap relative to the droplet's cell.
#[derive(Clone, Copy, Debug)]
struct BrushTap {
    dx: i32,
    dy: i32,
    weight: f32,
}

/// Droplet-based hydraulic erosion.
///
/// Each droplet rolls downhill following the bilinear gradient, picking up
/// sediment while it is under capacity and dropping it when over capacity or
/// when it climbs. Erosion is spread over a circular brush; deposition goes
/// to the four cells around the droplet.
#[derive(Debug, Default)]
pub struct HydraulicErosion {
    brush_radius: Option<usize>,
    brush: Vec<BrushTap>,
}

impl HydraulicErosion {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_brush(&mut self, radius: usize) {
        if self.brush_radius == Some(radius) {
            return;
        }
        self.brush = build_brush(radius);
        self.brush_radius = Some(radius);
    }

    fn erode_brush(&self, map: &mut Grid<f32>, cx: usize, cy: usize, amount: f32) -> f32 {
        let size = map.w as i32;
        let taps = self.brush.iter().filter_map(|tap| {
            let x = cx as i32 + tap.dx;
            let y = cy as i32 + tap.dy;
            (x >= 0 && y >= 0 && x < size && y < size).then_some((x as usize, y as usize, tap.weight))
        });
        let total: f32 = taps.clone().map(|(_, _, w)| w).sum();
        if total <= 0.0 {
            return 0.0;
        }

        let mut removed = 0.0;
        for (x, y, w) in taps {
            let i = map.idx(x, y);
            let weighed = amount * w / total;
            // Never dig below the current cell height in one step.
            let delta = map.data[i].min(weighed);
            map.data[i] -= delta;
            removed += delta;
        }
        removed
    }
}

fn build_brush(radius: usize) -> Vec<BrushTap> {
    if radius == 0 {
        return vec![BrushTap { dx: 0, dy: 0, weight: 1.0 }];
    }
    let r = radius as i32;
    let mut taps = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            let sqr = (dx * dx + dy * dy) as f32;
            if sqr < (r * r) as f32 {
                taps.push(BrushTap { dx, dy, weight: 1.0 - sqr.sqrt() / radius as f32 });
            }
        }
    }
    taps
}

fn deposit(map: &mut Grid<f32>, x: usize, y: usize, fx: f32, fy: f32, amount: f32) {
    let i = map.idx(x, y);
    let w = map.w;
    map.data[i] += amount * (1.0 - fx) * (1.0 - fy);
    map.data[i + 1] += amount * fx * (1.0 - fy);
    map.data[i + w] += amount * (1.0 - fx) * fy;
    map.data[i + w + 1] += amount * fx * fy;
}

impl ErosionEngine for HydraulicErosion {
    fn erode(&mut self, map: &mut Grid<f32>, settings: &ErosionSettings) {
        debug_assert!(map.is_square());
        let size = map.w;
        let radius = settings.brush_radius;
        if size <= 2 * radius + 1 {
            debug!(size, radius, "tile too small for the erosion brush, skipping");
            return;
        }
        self.ensure_brush(radius);

        let mut rng = Rng::new(settings.seed ^ SALT_DROPLET);
        let lo = radius as f32;
        let hi = (size - 1 - radius) as f32;
        let edge = (size - 1) as f32;

        for _ in 0..settings.num_iterations {
            let mut px = rng.range_f32(lo, hi);
            let mut py = rng.range_f32(lo, hi);
            let mut dir_x = 0.0f32;
            let mut dir_y = 0.0f32;
            let mut speed = settings.initial_speed;
            let mut water = settings.initial_water_volume;
            let mut sediment = 0.0f32;

            for _ in 0..settings.max_droplet_lifetime {
                let node_x = px as usize;
                let node_y = py as usize;
                let fx = px - node_x as f32;
                let fy = py - node_y as f32;

                let (height, gx, gy) = map.height_and_gradient(px, py);

                dir_x = dir_x * settings.inertia - gx * (1.0 - settings.inertia);
                dir_y = dir_y * settings.inertia - gy * (1.0 - settings.inertia);
                let len = (dir_x * dir_x + dir_y * dir_y).sqrt();
                if len > 0.0 {
                    dir_x /= len;
                    dir_y /= len;
                }
                px += dir_x;
                py += dir_y;

                if (dir_x == 0.0 && dir_y == 0.0) || px < 0.0 || py < 0.0 || px >= edge || py >= edge {
                    break;
                }

                let (new_height, _, _) = map.height_and_gradient(px, py);
                let delta_height = new_height - height;

                let capacity = (-delta_height * speed * water * settings.sediment_capacity_factor)
                    .max(settings.min_sediment_capacity);

                if sediment > capacity || delta_height > 0.0 {
                    let amount = if delta_height > 0.0 {
                        delta_height.min(sediment)
                    } else {
                        (sediment - capacity) * settings.deposit_speed
                    };
                    sediment -= amount;
                    deposit(map, node_x, node_y, fx, fy, amount);
                } else {
                    let amount = ((capacity - sediment) * settings.erode_speed).min(-delta_height);
                    sediment += self.erode_brush(map, node_x, node_y, amount);
                }

                speed = (speed * speed + delta_height * settings.gravity).max(0.0).sqrt();
                water *= 1.0 - settings.evaporate_speed;
            }
        }
    }
}
