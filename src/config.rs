use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::curve::HeightCurve;
use crate::error::ConfigError;
use crate::notify::{SettingsKind, UpdatableSettings};
use crate::preview::DrawMode;
use crate::vegetation::ScatterSettings;

/// Number of mesh resolutions the preview can step through.
pub const NUM_SUPPORTED_LODS: usize = 5;
pub const NUM_SUPPORTED_CHUNK_SIZES: usize = 9;
pub const NUM_SUPPORTED_FLATSHADED_CHUNK_SIZES: usize = 3;
/// Each entry divides by every LOD increment (1, 2, 4, 6, 8).
pub const SUPPORTED_CHUNK_SIZES: [usize; NUM_SUPPORTED_CHUNK_SIZES] =
    [48, 72, 96, 120, 144, 168, 192, 216, 240];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMode {
    /// Stretch the generated tile's own min..max onto 0..1.
    #[default]
    Local,
    /// Divide by the theoretical amplitude so neighbouring tiles agree.
    Global,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub normalize_mode: NormalizeMode,
    pub scale: f32,
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub seed: u64,
    pub offset: [f32; 2],
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            normalize_mode: NormalizeMode::Local,
            scale: 50.0,
            octaves: 6,
            persistence: 0.6,
            lacunarity: 2.0,
            seed: 0,
            offset: [0.0, 0.0],
        }
    }
}

impl NoiseSettings {
    pub fn validate_values(&mut self) {
        self.scale = self.scale.max(0.01);
        self.octaves = self.octaves.max(1);
        self.lacunarity = self.lacunarity.max(1.0);
        self.persistence = self.persistence.clamp(0.0, 1.0);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightMapSettings {
    pub use_falloff: bool,
    pub use_erosion: bool,
    pub height_multiplier: f32,
    pub height_curve: HeightCurve,
    pub noise: NoiseSettings,
}

impl Default for HeightMapSettings {
    fn default() -> Self {
        Self {
            use_falloff: false,
            use_erosion: true,
            height_multiplier: 30.0,
            height_curve: HeightCurve::linear(),
            noise: NoiseSettings::default(),
        }
    }
}

impl HeightMapSettings {
    pub fn min_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(0.0)
    }

    pub fn max_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(1.0)
    }
}

impl UpdatableSettings for HeightMapSettings {
    const KIND: SettingsKind = SettingsKind::HeightMap;

    fn validate_values(&mut self) {
        self.noise.validate_values();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    pub mesh_scale: f32,
    pub use_flat_shading: bool,
    pub chunk_size_index: usize,
    pub flatshaded_chunk_size_index: usize,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            mesh_scale: 2.5,
            use_flat_shading: false,
            chunk_size_index: 4,
            flatshaded_chunk_size_index: 0,
        }
    }
}

impl MeshSettings {
    pub fn chunk_size(&self) -> usize {
        if self.use_flat_shading {
            SUPPORTED_CHUNK_SIZES[self.flatshaded_chunk_size_index]
        } else {
            SUPPORTED_CHUNK_SIZES[self.chunk_size_index]
        }
    }

    /// Vertices per line at LOD 0, including the one-vertex normal border on each side.
    pub fn num_verts_per_line(&self) -> usize {
        self.chunk_size() + 3
    }

    pub fn mesh_world_size(&self) -> f32 {
        (self.num_verts_per_line() - 3) as f32 * self.mesh_scale
    }
}

impl UpdatableSettings for MeshSettings {
    const KIND: SettingsKind = SettingsKind::Mesh;

    fn validate_values(&mut self) {
        self.mesh_scale = self.mesh_scale.max(0.01);
        self.chunk_size_index = self.chunk_size_index.min(NUM_SUPPORTED_CHUNK_SIZES - 1);
        self.flatshaded_chunk_size_index = self
            .flatshaded_chunk_size_index
            .min(NUM_SUPPORTED_FLATSHADED_CHUNK_SIZES - 1);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionSettings {
    pub seed: u64,
    pub num_iterations: usize,
    /// Brush footprint, also the border added around the generated tile.
    pub brush_radius: usize,
    /// At zero water instantly changes direction to flow downhill. At 1 it never does.
    pub inertia: f32,
    pub sediment_capacity_factor: f32,
    /// Stops the capacity falling to zero on flat terrain.
    pub min_sediment_capacity: f32,
    pub erode_speed: f32,
    pub deposit_speed: f32,
    pub evaporate_speed: f32,
    pub gravity: f32,
    pub max_droplet_lifetime: usize,
    pub initial_water_volume: f32,
    pub initial_speed: f32,
}

impl Default for ErosionSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            num_iterations: 50_000,
            brush_radius: 3,
            inertia: 0.05,
            sediment_capacity_factor: 4.0,
            min_sediment_capacity: 0.01,
            erode_speed: 0.3,
            deposit_speed: 0.3,
            evaporate_speed: 0.01,
            gravity: 4.0,
            max_droplet_lifetime: 30,
            initial_water_volume: 1.0,
            initial_speed: 1.0,
        }
    }
}

impl UpdatableSettings for ErosionSettings {
    const KIND: SettingsKind = SettingsKind::Erosion;

    fn validate_values(&mut self) {
        self.inertia = self.inertia.clamp(0.0, 1.0);
        self.erode_speed = self.erode_speed.clamp(0.0, 1.0);
        self.deposit_speed = self.deposit_speed.clamp(0.0, 1.0);
        self.evaporate_speed = self.evaporate_speed.clamp(0.0, 1.0);
        self.max_droplet_lifetime = self.max_droplet_lifetime.max(1);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureLayer {
    pub tint: [f32; 3],
    pub tint_strength: f32,
    pub start_height: f32,
    pub blend_strength: f32,
    pub texture_scale: f32,
}

impl Default for TextureLayer {
    fn default() -> Self {
        Self {
            tint: [1.0, 1.0, 1.0],
            tint_strength: 1.0,
            start_height: 0.0,
            blend_strength: 0.1,
            texture_scale: 10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSettings {
    pub layers: Vec<TextureLayer>,
}

impl Default for TextureSettings {
    fn default() -> Self {
        let layer = |tint, start_height, blend_strength| TextureLayer {
            tint,
            start_height,
            blend_strength,
            ..TextureLayer::default()
        };
        Self {
            layers: vec![
                layer([0.18, 0.32, 0.55], 0.0, 0.05),
                layer([0.82, 0.78, 0.58], 0.28, 0.05),
                layer([0.30, 0.52, 0.22], 0.34, 0.1),
                layer([0.45, 0.40, 0.35], 0.62, 0.15),
                layer([0.95, 0.96, 0.98], 0.86, 0.1),
            ],
        }
    }
}

impl UpdatableSettings for TextureSettings {
    const KIND: SettingsKind = SettingsKind::Texture;

    fn validate_values(&mut self) {
        for layer in &mut self.layers {
            layer.tint_strength = layer.tint_strength.clamp(0.0, 1.0);
            layer.start_height = layer.start_height.clamp(0.0, 1.0);
            layer.blend_strength = layer.blend_strength.clamp(0.0, 1.0);
        }
    }
}

/// Everything the preview reads, as loaded from a TOML file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub draw_mode: DrawMode,
    pub editor_lod: usize,
    pub auto_update: bool,
    pub hide_on_start: bool,
    pub mesh: MeshSettings,
    pub height_map: HeightMapSettings,
    pub erosion: ErosionSettings,
    pub texture: TextureSettings,
    pub vegetation: ScatterSettings,
}

impl PreviewConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
