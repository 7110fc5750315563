/// Row-major flat grid. No per-cell objects, f32 friendly.
/// Edges clamp; there is no wrapping in a preview tile.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    pub data: Vec<T>,
    pub w: usize,
    pub h: usize,
}

impl<T: Copy + Default> Grid<T> {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            data: vec![T::default(); w * h],
            w,
            h,
        }
    }

    /// Square grid of `size * size` cells.
    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }

    /// Wrap an existing row-major buffer. Returns None on a length mismatch.
    pub fn from_vec(data: Vec<T>, w: usize, h: usize) -> Option<Self> {
        (data.len() == w * h).then_some(Self { data, w, h })
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.w && y < self.h);
        y * self.w + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: T) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    /// Read with coordinates clamped into the grid.
    #[inline]
    pub fn get_clamped(&self, x: i32, y: i32) -> T {
        let cx = x.clamp(0, self.w as i32 - 1) as usize;
        let cy = y.clamp(0, self.h as i32 - 1) as usize;
        self.get(cx, cy)
    }

    pub fn is_square(&self) -> bool {
        self.w == self.h
    }
}

impl Grid<f32> {
    /// (min, max) over all cells. An empty grid yields (0, 0).
    pub fn min_max(&self) -> (f32, f32) {
        if self.data.is_empty() {
            return (0.0, 0.0);
        }
        self.data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    /// Bilinear height and gradient at a fractional position.
    /// The position must satisfy `0 <= x < w - 1` and `0 <= y < h - 1`.
    pub fn height_and_gradient(&self, x: f32, y: f32) -> (f32, f32, f32) {
        let cx = x.floor() as usize;
        let cy = y.floor() as usize;
        let fx = x - cx as f32;
        let fy = y - cy as f32;

        let nw = self.get(cx, cy);
        let ne = self.get(cx + 1, cy);
        let sw = self.get(cx, cy + 1);
        let se = self.get(cx + 1, cy + 1);

        let gx = (ne - nw) * (1.0 - fy) + (se - sw) * fy;
        let gy = (sw - nw) * (1.0 - fx) + (se - ne) * fx;
        let height = nw * (1.0 - fx) * (1.0 - fy) + ne * fx * (1.0 - fy) + sw * (1.0 - fx) * fy + se * fx * fy;
        (height, gx, gy)
    }
}
