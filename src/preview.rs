//! The preview controller: turns the current settings into either a flat
//! texture or a terrain mesh, keeps the two display surfaces consistent
//! with the draw mode, and reacts to settings edits while in design mode.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use glam::Vec3;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Timing;
use crate::config::{
    ErosionSettings, HeightMapSettings, MeshSettings, NUM_SUPPORTED_LODS, PreviewConfig, TextureSettings,
};
use crate::erosion::ErosionEngine;
use crate::error::{PreviewError, Result};
use crate::falloff::generate_falloff_map;
use crate::height_map::{
    HeightMap, HeightMapSource, NoiseHeightMapGenerator, apply_erosion_and_height_multiplier,
    apply_height_multiplier, height_map_for_values,
};
use crate::mesh::{MeshData, generate_terrain_mesh};
use crate::notify::{Settings, SettingsChanged, SettingsKind, Subscription};
use crate::render::TerrainMaterial;
use crate::texture::texture_from_height_map;
use crate::vegetation::{Placement, VegetationInstance, VegetationSpawner};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawMode {
    /// Grayscale image of the generated height map.
    #[default]
    NoiseMap,
    /// 3D terrain mesh of the generated height map.
    Mesh,
    /// Grayscale image of the edge falloff field alone.
    FalloffMap,
}

/// Whether the host is editing (previews refresh on edits) or running (they don't).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Design,
    Live,
}

/// Flat quad that shows an image.
#[derive(Clone, Debug, Default)]
pub struct TextureSurface {
    pub texture: Option<RgbaImage>,
    pub scale: Vec3,
    pub active: bool,
}

/// Mesh display plus the collider that shares its geometry.
#[derive(Clone, Debug, Default)]
pub struct MeshSurface {
    pub mesh: Option<Arc<MeshData>>,
    pub collider: Option<Arc<MeshData>>,
    pub active: bool,
}

pub struct PreviewController {
    draw_mode: DrawMode,
    editor_lod: usize,
    auto_update: bool,
    hide_on_start: bool,
    run_mode: RunMode,
    placement: Placement,

    mesh_settings: Settings<MeshSettings>,
    height_map_settings: Settings<HeightMapSettings>,
    erosion_settings: Settings<ErosionSettings>,
    texture_settings: Settings<TextureSettings>,

    height_source: Box<dyn HeightMapSource>,
    erosion: Option<Box<dyn ErosionEngine>>,
    vegetation_spawner: Option<Box<dyn VegetationSpawner>>,

    texture_surface: TextureSurface,
    mesh_surface: MeshSurface,
    material: TerrainMaterial,
    height_map: Option<HeightMap>,
    last_timings: Vec<Timing>,
    hidden: bool,

    subscriptions: Vec<Subscription>,
    changes_tx: Sender<SettingsChanged>,
    changes_rx: Receiver<SettingsChanged>,
}

impl PreviewController {
    pub fn new(
        mesh_settings: Settings<MeshSettings>,
        height_map_settings: Settings<HeightMapSettings>,
        erosion_settings: Settings<ErosionSettings>,
        texture_settings: Settings<TextureSettings>,
    ) -> Self {
        let (changes_tx, changes_rx) = unbounded();
        let mut controller = Self {
            draw_mode: DrawMode::default(),
            editor_lod: 0,
            auto_update: false,
            hide_on_start: false,
            run_mode: RunMode::default(),
            placement: Placement::default(),
            mesh_settings,
            height_map_settings,
            erosion_settings,
            texture_settings,
            height_source: Box::new(NoiseHeightMapGenerator),
            erosion: None,
            vegetation_spawner: None,
            texture_surface: TextureSurface::default(),
            mesh_surface: MeshSurface::default(),
            material: TerrainMaterial::default(),
            height_map: None,
            last_timings: Vec::new(),
            hidden: false,
            subscriptions: Vec::new(),
            changes_tx,
            changes_rx,
        };
        controller.reattach_change_listeners();
        controller.on_texture_values_updated();
        controller
    }

    /// Fresh settings handles seeded from a loaded config.
    pub fn from_config(config: &PreviewConfig) -> Result<Self> {
        let mut controller = Self::new(
            Settings::new(config.mesh.clone()),
            Settings::new(config.height_map.clone()),
            Settings::new(config.erosion.clone()),
            Settings::new(config.texture.clone()),
        );
        controller.draw_mode = config.draw_mode;
        controller.auto_update = config.auto_update;
        controller.hide_on_start = config.hide_on_start;
        controller.check_lod(config.editor_lod)?;
        controller.editor_lod = config.editor_lod;
        Ok(controller)
    }

    pub fn with_erosion(mut self, engine: impl ErosionEngine + 'static) -> Self {
        self.erosion = Some(Box::new(engine));
        self
    }

    pub fn with_vegetation_spawner(mut self, spawner: impl VegetationSpawner + 'static) -> Self {
        self.vegetation_spawner = Some(Box::new(spawner));
        self
    }

    pub fn with_height_source(mut self, source: impl HeightMapSource + 'static) -> Self {
        self.height_source = Box::new(source);
        self
    }

    pub fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Host start-up hook. Hides the whole preview when configured to.
    pub fn start(&mut self) {
        if self.hide_on_start {
            self.texture_surface.active = false;
            self.mesh_surface.active = false;
            self.hidden = true;
        }
    }

    fn check_lod(&self, lod: usize) -> Result<()> {
        if lod >= NUM_SUPPORTED_LODS {
            return Err(PreviewError::InvalidLod { lod, max: NUM_SUPPORTED_LODS - 1 });
        }
        Ok(())
    }

    /// Regenerate the height map and draw it in the current mode.
    pub fn generate_preview(&mut self) -> Result<Vec<Timing>> {
        let mut timings = Vec::new();
        let total_start = Instant::now();

        let mesh = self.mesh_settings.get();
        let height_settings = self.height_map_settings.get();
        let erosion = self.erosion_settings.get();

        let map_size = mesh.num_verts_per_line();
        let map_size_with_border = map_size + erosion.brush_radius * 2;
        info!(mode = ?self.draw_mode, size = map_size_with_border, "generating preview");

        let t = Instant::now();
        let mut values = self
            .height_source
            .generate(map_size_with_border, &erosion, &height_settings, [0.0, 0.0]);
        timings.push(Timing::since("height_map", t));

        let t = Instant::now();
        if height_settings.use_erosion {
            let engine = self
                .erosion
                .as_deref_mut()
                .ok_or(PreviewError::MissingCollaborator("erosion engine"))?;
            values = apply_erosion_and_height_multiplier(
                values,
                map_size_with_border,
                engine,
                &erosion,
                &height_settings,
            )?;
            timings.push(Timing::since("erosion", t));
        } else {
            apply_height_multiplier(&mut values, &height_settings);
            timings.push(Timing::since("height_multiplier", t));
        }

        self.height_map = Some(height_map_for_values(values, map_size_with_border)?);
        self.material
            .update_mesh_heights(height_settings.min_height(), height_settings.max_height());

        let t = Instant::now();
        match self.draw_mode {
            DrawMode::NoiseMap => {
                let texture = texture_from_height_map(self.current_height_map()?);
                self.draw_texture(texture);
            }
            DrawMode::Mesh => {
                let mesh_data = generate_terrain_mesh(self.current_height_map()?, &mesh, self.editor_lod)?;
                self.draw_mesh(mesh_data);
            }
            DrawMode::FalloffMap => {
                let falloff = HeightMap::new(generate_falloff_map(map_size), 0.0, 1.0);
                self.draw_texture(texture_from_height_map(&falloff));
            }
        }
        timings.push(Timing::since("draw", t));
        timings.push(Timing::since("TOTAL", total_start));

        for timing in &timings {
            debug!(stage = timing.name, ms = timing.ms, "preview stage");
        }
        self.last_timings = timings.clone();
        Ok(timings)
    }

    fn current_height_map(&self) -> Result<&HeightMap> {
        self.height_map.as_ref().ok_or(PreviewError::NoPriorGeneration)
    }

    /// Show an image on the flat surface and hide the mesh.
    pub fn draw_texture(&mut self, texture: RgbaImage) {
        let (w, h) = texture.dimensions();
        self.texture_surface.scale = Vec3::new(w as f32, 1.0, h as f32) / 10.0;
        self.texture_surface.texture = Some(texture);

        self.texture_surface.active = true;
        self.mesh_surface.active = false;
    }

    /// Show a mesh (and use it as the collider) and hide the flat surface.
    pub fn draw_mesh(&mut self, mesh_data: MeshData) {
        let mesh = Arc::new(mesh_data);
        self.mesh_surface.mesh = Some(Arc::clone(&mesh));
        self.mesh_surface.collider = Some(mesh);

        self.texture_surface.active = false;
        self.mesh_surface.active = true;
    }

    /// Scatter vegetation over the most recently generated height map.
    pub fn spawn_vegetation(&mut self) -> Result<Vec<VegetationInstance>> {
        let spawner = self
            .vegetation_spawner
            .as_deref_mut()
            .ok_or(PreviewError::MissingCollaborator("vegetation spawner"))?;
        let height_map = self.height_map.as_ref().ok_or(PreviewError::NoPriorGeneration)?;
        let instances = spawner.spawn(&self.placement, height_map);
        info!(count = instances.len(), "spawned vegetation");
        Ok(instances)
    }

    /// Mesh, height map or erosion settings changed. Returns true if the preview was redrawn.
    pub fn on_configuration_changed(&mut self) -> Result<bool> {
        if self.run_mode != RunMode::Design {
            debug!("settings changed while live, preview left as is");
            return Ok(false);
        }
        self.generate_preview()?;
        Ok(true)
    }

    pub fn on_texture_values_updated(&mut self) {
        self.texture_settings.read(|t| t.apply_to_material(&mut self.material));
    }

    /// Handle every queued settings notification. Returns how many redraws ran.
    ///
    /// A failed redraw does not stop the drain; the first error is returned
    /// once every notification has been handled.
    pub fn process_pending_changes(&mut self) -> Result<usize> {
        let mut redraws = 0;
        let mut first_error = None;
        while let Ok(change) = self.changes_rx.try_recv() {
            if !self.is_current(&change) {
                debug!(source = ?change.source, "notification from a replaced settings handle, ignored");
                continue;
            }
            match change.source {
                SettingsKind::Texture => self.on_texture_values_updated(),
                SettingsKind::Mesh | SettingsKind::HeightMap | SettingsKind::Erosion => {
                    match self.on_configuration_changed() {
                        Ok(true) => redraws += 1,
                        Ok(false) => {}
                        Err(e) => {
                            warn!(source = ?change.source, "preview redraw failed: {e}");
                            first_error.get_or_insert(e);
                        }
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(redraws),
        }
    }

    fn is_current(&self, change: &SettingsChanged) -> bool {
        let current = match change.source {
            SettingsKind::Mesh => self.mesh_settings.id(),
            SettingsKind::HeightMap => self.height_map_settings.id(),
            SettingsKind::Erosion => self.erosion_settings.id(),
            SettingsKind::Texture => self.texture_settings.id(),
        };
        change.settings == current
    }

    /// Drop every existing subscription and subscribe once to each settings handle.
    pub fn reattach_change_listeners(&mut self) {
        self.subscriptions.clear();
        self.subscriptions = vec![
            self.mesh_settings.subscribe(self.changes_tx.clone()),
            self.height_map_settings.subscribe(self.changes_tx.clone()),
            self.erosion_settings.subscribe(self.changes_tx.clone()),
            self.texture_settings.subscribe(self.changes_tx.clone()),
        ];
    }

    /// The controller's own fields changed: rewire listeners and redraw if auto-updating.
    pub fn on_validate(&mut self) -> Result<()> {
        self.reattach_change_listeners();
        self.on_texture_values_updated();
        if self.auto_update && self.run_mode == RunMode::Design {
            self.generate_preview()?;
        }
        Ok(())
    }

    pub fn set_draw_mode(&mut self, draw_mode: DrawMode) -> Result<()> {
        self.draw_mode = draw_mode;
        self.on_validate()
    }

    pub fn set_editor_lod(&mut self, lod: usize) -> Result<()> {
        self.check_lod(lod)?;
        self.editor_lod = lod;
        self.on_validate()
    }

    pub fn set_auto_update(&mut self, auto_update: bool) -> Result<()> {
        self.auto_update = auto_update;
        self.on_validate()
    }

    pub fn set_mesh_settings(&mut self, settings: Settings<MeshSettings>) -> Result<()> {
        self.mesh_settings = settings;
        self.on_validate()
    }

    pub fn set_height_map_settings(&mut self, settings: Settings<HeightMapSettings>) -> Result<()> {
        self.height_map_settings = settings;
        self.on_validate()
    }

    pub fn set_erosion_settings(&mut self, settings: Settings<ErosionSettings>) -> Result<()> {
        self.erosion_settings = settings;
        self.on_validate()
    }

    pub fn set_texture_settings(&mut self, settings: Settings<TextureSettings>) -> Result<()> {
        self.texture_settings = settings;
        self.on_validate()
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    pub fn editor_lod(&self) -> usize {
        self.editor_lod
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn mesh_settings(&self) -> &Settings<MeshSettings> {
        &self.mesh_settings
    }

    pub fn height_map_settings(&self) -> &Settings<HeightMapSettings> {
        &self.height_map_settings
    }

    pub fn erosion_settings(&self) -> &Settings<ErosionSettings> {
        &self.erosion_settings
    }

    pub fn texture_settings(&self) -> &Settings<TextureSettings> {
        &self.texture_settings
    }

    pub fn texture_surface(&self) -> &TextureSurface {
        &self.texture_surface
    }

    pub fn mesh_surface(&self) -> &MeshSurface {
        &self.mesh_surface
    }

    pub fn material(&self) -> &TerrainMaterial {
        &self.material
    }

    pub fn height_map(&self) -> Option<&HeightMap> {
        self.height_map.as_ref()
    }

    /// Stage timings of the most recent generation.
    pub fn last_timings(&self) -> &[Timing] {
        &self.last_timings
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erosion::HydraulicErosion;

    fn small_controller() -> PreviewController {
        let mesh = MeshSettings { chunk_size_index: 0, ..MeshSettings::default() };
        let erosion = ErosionSettings { num_iterations: 200, ..ErosionSettings::default() };
        PreviewController::new(
            Settings::new(mesh),
            Settings::default(),
            Settings::new(erosion),
            Settings::default(),
        )
        .with_erosion(HydraulicErosion::new())
    }

    #[test]
    fn noise_map_texture_has_bordered_size_and_scale() {
        let mut c = small_controller();
        c.generate_preview().unwrap();
        let surface = c.texture_surface();
        let tex = surface.texture.as_ref().unwrap();
        // 51 vertices plus a 3-cell erosion border on both sides.
        assert_eq!(tex.dimensions(), (57, 57));
        assert_eq!(surface.scale, Vec3::new(5.7, 0.1, 5.7));
    }

    #[test]
    fn falloff_texture_ignores_erosion_border() {
        let mut c = small_controller();
        c.set_draw_mode(DrawMode::FalloffMap).unwrap();
        c.generate_preview().unwrap();
        assert_eq!(c.texture_surface().texture.as_ref().unwrap().dimensions(), (51, 51));
    }

    #[test]
    fn mesh_and_collider_share_geometry() {
        let mut c = small_controller();
        c.set_draw_mode(DrawMode::Mesh).unwrap();
        c.generate_preview().unwrap();
        let s = c.mesh_surface();
        assert!(Arc::ptr_eq(s.mesh.as_ref().unwrap(), s.collider.as_ref().unwrap()));
    }

    #[test]
    fn material_tracks_texture_and_height_range() {
        let mut c = small_controller();
        c.generate_preview().unwrap();
        let hm = c.height_map_settings().get();
        assert_eq!(c.material().layer_count(), TextureSettings::default().layers.len());
        assert_eq!(c.material().max_height, hm.max_height());
    }

    #[test]
    fn lod_out_of_range_is_rejected() {
        let mut c = small_controller();
        assert!(matches!(c.set_editor_lod(NUM_SUPPORTED_LODS), Err(PreviewError::InvalidLod { .. })));
        assert_eq!(c.editor_lod(), 0);
    }

    #[test]
    fn hide_on_start_hides_preview() {
        let cfg = PreviewConfig { hide_on_start: true, ..PreviewConfig::default() };
        let mut c = PreviewController::from_config(&cfg).unwrap();
        assert!(!c.is_hidden());
        c.start();
        assert!(c.is_hidden());
        assert!(!c.texture_surface().active && !c.mesh_surface().active);
    }

    #[test]
    fn auto_update_redraws_on_own_edits() {
        let mut c = small_controller();
        c.set_auto_update(true).unwrap();
        assert!(c.height_map().is_some());
        c.set_draw_mode(DrawMode::Mesh).unwrap();
        assert!(c.mesh_surface().active);
    }

    #[test]
    fn reattaching_keeps_one_listener_per_handle() {
        let mut c = small_controller();
        for _ in 0..5 {
            c.reattach_change_listeners();
        }
        assert_eq!(c.subscription_count(), 4);
        assert_eq!(c.mesh_settings().listener_count(), 1);
        assert_eq!(c.texture_settings().listener_count(), 1);
    }

    #[test]
    fn swapped_handle_releases_old_one() {
        let mut c = small_controller();
        let old = c.mesh_settings().clone();
        c.set_mesh_settings(Settings::new(MeshSettings::default())).unwrap();
        assert_eq!(old.listener_count(), 0);
        assert_eq!(c.mesh_settings().listener_count(), 1);
    }
}
