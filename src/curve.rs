use serde::{Deserialize, Serialize};

/// Piecewise-linear response curve over normalised height.
///
/// Keys are `[t, value]` pairs. Evaluation clamps outside the first and last key.
/// An empty curve is the identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeightCurve {
    keys: Vec<[f32; 2]>,
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl HeightCurve {
    pub fn linear() -> Self {
        Self { keys: vec![[0.0, 0.0], [1.0, 1.0]] }
    }

    /// Build from arbitrary keys; they are sorted by `t`.
    pub fn from_keys(mut keys: Vec<[f32; 2]>) -> Self {
        keys.sort_by(|a, b| a[0].total_cmp(&b[0]));
        Self { keys }
    }

    pub fn keys(&self) -> &[[f32; 2]] {
        &self.keys
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return t;
        };
        if t <= first[0] {
            return first[1];
        }
        for pair in self.keys.windows(2) {
            let [t0, v0] = pair[0];
            let [t1, v1] = pair[1];
            if t <= t1 {
                let span = t1 - t0;
                if span <= f32::EPSILON {
                    return v1;
                }
                return v0 + (v1 - v0) * (t - t0) / span;
            }
        }
        self.keys[self.keys.len() - 1][1]
    }
}
