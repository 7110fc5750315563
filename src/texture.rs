use image::RgbaImage;
use rayon::prelude::*;

use crate::height_map::HeightMap;

/// Grayscale encoding of a height map: black at `min_value`, white at `max_value`.
pub fn texture_from_height_map(height_map: &HeightMap) -> RgbaImage {
    let map = &height_map.values;
    let w = map.w;
    let mut img = RgbaImage::new(map.w as u32, map.h as u32);
    if w == 0 {
        return img;
    }

    img.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let t = height_map.normalised(map.get(x, y));
            let v = (t * 255.0).round() as u8;
            row[x * 4..x * 4 + 4].copy_from_slice(&[v, v, v, 255]);
        }
    });

    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn range_maps_to_black_and_white() {
        let grid = Grid::from_vec(vec![-2.0, 0.0, 2.0, 8.0], 2, 2).unwrap();
        let img = texture_from_height_map(&HeightMap::new(grid, -2.0, 2.0));
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [128, 128, 128, 255]);
        assert_eq!(img.get_pixel(0, 1).0, [255, 255, 255, 255]);
        // Values above the declared range clamp.
        assert_eq!(img.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }
}
