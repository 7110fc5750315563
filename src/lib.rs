pub mod config;
pub mod curve;
pub mod erosion;
pub mod error;
pub mod falloff;
pub mod grid;
pub mod height_map;
pub mod logging;
pub mod mesh;
pub mod noise;
pub mod notify;
pub mod preview;
pub mod render;
pub mod rng;
pub mod texture;
pub mod vegetation;

use std::time::Instant;

pub use config::PreviewConfig;
pub use error::{PreviewError, Result};
pub use preview::{DrawMode, PreviewController, RunMode};

/// Wall time of one preview stage.
#[derive(Clone, Debug)]
pub struct Timing {
    pub name: &'static str,
    pub ms: f64,
}

impl Timing {
    pub fn since(name: &'static str, start: Instant) -> Self {
        Self {
            name,
            ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }
}
