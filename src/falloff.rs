use crate::grid::Grid;

/// Curve steepness and shoulder position of the falloff ramp.
const FALLOFF_A: f32 = 3.0;
const FALLOFF_B: f32 = 2.2;

#[inline]
fn evaluate(v: f32) -> f32 {
    let p = v.powf(FALLOFF_A);
    p / (p + (FALLOFF_B - FALLOFF_B * v).powf(FALLOFF_A))
}

/// Square falloff field: 0 in the middle of the tile, rising to 1 at the edges.
pub fn generate_falloff_map(size: usize) -> Grid<f32> {
    let mut map = Grid::<f32>::square(size);
    if size < 2 {
        map.data.fill(1.0);
        return map;
    }
    let span = (size - 1) as f32;
    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 / span * 2.0 - 1.0;
            let fy = y as f32 / span * 2.0 - 1.0;
            let v = fx.abs().max(fy.abs());
            map.set(x, y, evaluate(v));
        }
    }
    map
}
