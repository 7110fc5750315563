use std::sync::{Arc, Mutex};

use terrain_preview::config::{ErosionSettings, HeightMapSettings, MeshSettings, TextureSettings};
use terrain_preview::erosion::{ErosionEngine, HydraulicErosion};
use terrain_preview::grid::Grid;
use terrain_preview::height_map::{HeightMap, HeightMapSource, NoiseHeightMapGenerator};
use terrain_preview::notify::Settings;
use terrain_preview::vegetation::{Placement, VegetationInstance, VegetationSpawner};
use terrain_preview::{DrawMode, PreviewController, PreviewError, RunMode};

/// Counts erosion passes and leaves the map alone.
#[derive(Clone, Default)]
struct RecordingErosion {
    calls: Arc<Mutex<usize>>,
}

impl ErosionEngine for RecordingErosion {
    fn erode(&mut self, _map: &mut Grid<f32>, _settings: &ErosionSettings) {
        *self.calls.lock().unwrap() += 1;
    }
}

/// Delegates to the noise generator and records every requested size.
#[derive(Clone, Default)]
struct RecordingSource {
    sizes: Arc<Mutex<Vec<usize>>>,
}

impl HeightMapSource for RecordingSource {
    fn generate(
        &mut self,
        size: usize,
        erosion: &ErosionSettings,
        settings: &HeightMapSettings,
        origin: [f32; 2],
    ) -> Vec<f32> {
        self.sizes.lock().unwrap().push(size);
        NoiseHeightMapGenerator.generate(size, erosion, settings, origin)
    }
}

/// Keeps a copy of every height map it was handed.
#[derive(Clone, Default)]
struct RecordingSpawner {
    seen: Arc<Mutex<Vec<(Placement, HeightMap)>>>,
}

impl VegetationSpawner for RecordingSpawner {
    fn spawn(&mut self, placement: &Placement, height_map: &HeightMap) -> Vec<VegetationInstance> {
        self.seen.lock().unwrap().push((*placement, height_map.clone()));
        Vec::new()
    }
}

struct Harness {
    preview: PreviewController,
    erosion_calls: Arc<Mutex<usize>>,
    sizes: Arc<Mutex<Vec<usize>>>,
    spawned: Arc<Mutex<Vec<(Placement, HeightMap)>>>,
}

fn harness(brush_radius: usize, use_erosion: bool) -> Harness {
    let erosion = RecordingErosion::default();
    let source = RecordingSource::default();
    let spawner = RecordingSpawner::default();
    Harness {
        erosion_calls: erosion.calls.clone(),
        sizes: source.sizes.clone(),
        spawned: spawner.seen.clone(),
        preview: PreviewController::new(
            Settings::new(MeshSettings { chunk_size_index: 0, ..MeshSettings::default() }),
            Settings::new(HeightMapSettings { use_erosion, ..HeightMapSettings::default() }),
            Settings::new(ErosionSettings { brush_radius, ..ErosionSettings::default() }),
            Settings::new(TextureSettings::default()),
        )
        .with_erosion(erosion)
        .with_height_source(source)
        .with_vegetation_spawner(spawner),
    }
}

fn active_surfaces(preview: &PreviewController) -> (bool, bool) {
    (preview.texture_surface().active, preview.mesh_surface().active)
}

#[test]
fn every_mode_leaves_exactly_one_surface_active() {
    let mut h = harness(2, true);
    for mode in [DrawMode::NoiseMap, DrawMode::Mesh, DrawMode::FalloffMap, DrawMode::NoiseMap] {
        h.preview.set_draw_mode(mode).unwrap();
        h.preview.generate_preview().unwrap();
        let (texture, mesh) = active_surfaces(&h.preview);
        assert!(texture ^ mesh, "{mode:?}: texture={texture} mesh={mesh}");
        assert_eq!(mesh, mode == DrawMode::Mesh);
    }
}

#[test]
fn switching_modes_back_and_forth_is_idempotent() {
    let mut h = harness(3, false);
    h.preview.set_draw_mode(DrawMode::Mesh).unwrap();
    h.preview.generate_preview().unwrap();
    let first_mesh = h.preview.mesh_surface().mesh.clone().unwrap();
    let first_map = h.preview.height_map().cloned().unwrap();

    h.preview.set_draw_mode(DrawMode::NoiseMap).unwrap();
    h.preview.generate_preview().unwrap();
    let texture = h.preview.texture_surface().texture.clone().unwrap();

    h.preview.set_draw_mode(DrawMode::Mesh).unwrap();
    h.preview.generate_preview().unwrap();
    assert_eq!(*h.preview.mesh_surface().mesh.clone().unwrap(), *first_mesh);
    assert_eq!(h.preview.height_map().unwrap(), &first_map);
    assert_eq!(active_surfaces(&h.preview), (false, true));

    h.preview.set_draw_mode(DrawMode::NoiseMap).unwrap();
    h.preview.generate_preview().unwrap();
    assert_eq!(h.preview.texture_surface().texture.as_ref().unwrap(), &texture);
}

#[test]
fn erosion_runs_only_when_enabled() {
    let mut on = harness(3, true);
    on.preview.generate_preview().unwrap();
    on.preview.generate_preview().unwrap();
    assert_eq!(*on.erosion_calls.lock().unwrap(), 2);

    let mut off = harness(3, false);
    off.preview.generate_preview().unwrap();
    assert_eq!(*off.erosion_calls.lock().unwrap(), 0);

    // Turning it on through the settings handle routes through erosion again.
    off.preview.height_map_settings().update(|s| s.use_erosion = true);
    off.preview.process_pending_changes().unwrap();
    assert_eq!(*off.erosion_calls.lock().unwrap(), 1);
}

#[test]
fn spawner_receives_the_latest_height_map() {
    let mut h = harness(3, true);
    h.preview.set_draw_mode(DrawMode::Mesh).unwrap();
    h.preview.generate_preview().unwrap();
    h.preview.height_map_settings().update(|s| s.noise.seed = 99);
    h.preview.process_pending_changes().unwrap();

    h.preview.spawn_vegetation().unwrap();
    let seen = h.spawned.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(&seen[0].1, h.preview.height_map().unwrap());
    assert_eq!(seen[0].0, *h.preview.placement());
}

#[test]
fn grid_size_adds_twice_the_brush_radius() {
    for radius in [0, 4] {
        let mut h = harness(radius, true);
        h.preview.generate_preview().unwrap();
        let verts = h.preview.mesh_settings().get().num_verts_per_line();
        assert_eq!(*h.sizes.lock().unwrap(), vec![verts + 2 * radius]);
        assert_eq!(h.preview.height_map().unwrap().size(), verts + 2 * radius);
    }
}

#[test]
fn each_notification_redraws_once_after_repeated_rewiring() {
    let mut h = harness(2, false);
    for _ in 0..10 {
        h.preview.reattach_change_listeners();
    }
    h.preview.set_editor_lod(1).unwrap();
    h.preview.set_draw_mode(DrawMode::Mesh).unwrap();

    for i in 0..3 {
        h.preview.mesh_settings().update(|m| m.mesh_scale = 2.0 + i as f32);
        assert_eq!(h.preview.process_pending_changes().unwrap(), 1);
    }
    assert_eq!(h.sizes.lock().unwrap().len(), 3);

    h.preview.height_map_settings().update(|s| s.height_multiplier = 12.0);
    h.preview.erosion_settings().update(|e| e.seed = 5);
    assert_eq!(h.preview.process_pending_changes().unwrap(), 2);
    assert_eq!(h.sizes.lock().unwrap().len(), 5);
}

#[test]
fn live_mode_ignores_settings_edits() {
    let mut h = harness(2, false);
    h.preview = h.preview.with_run_mode(RunMode::Live);
    h.preview.mesh_settings().update(|m| m.mesh_scale = 3.0);
    assert_eq!(h.preview.process_pending_changes().unwrap(), 0);
    assert!(h.sizes.lock().unwrap().is_empty());
    assert!(h.preview.height_map().is_none());
}

#[test]
fn texture_edits_update_material_without_redrawing() {
    let mut h = harness(2, false);
    h.preview.texture_settings().update(|t| t.layers.truncate(2));
    assert_eq!(h.preview.process_pending_changes().unwrap(), 0);
    assert_eq!(h.preview.material().layer_count(), 2);
    assert!(h.sizes.lock().unwrap().is_empty());
}

#[test]
fn spawning_before_generation_is_an_error() {
    let mut h = harness(2, false);
    assert!(matches!(h.preview.spawn_vegetation(), Err(PreviewError::NoPriorGeneration)));
    assert!(h.spawned.lock().unwrap().is_empty());
}

#[test]
fn missing_collaborators_are_reported() {
    let mut preview = PreviewController::new(
        Settings::new(MeshSettings { chunk_size_index: 0, ..MeshSettings::default() }),
        Settings::new(HeightMapSettings { use_erosion: true, ..HeightMapSettings::default() }),
        Settings::default(),
        Settings::default(),
    );
    assert!(matches!(
        preview.generate_preview(),
        Err(PreviewError::MissingCollaborator("erosion engine"))
    ));

    preview.height_map_settings().update(|s| s.use_erosion = false);
    preview.process_pending_changes().unwrap();
    assert!(matches!(
        preview.spawn_vegetation(),
        Err(PreviewError::MissingCollaborator("vegetation spawner"))
    ));
}

#[test]
fn real_erosion_changes_the_preview() {
    let settings = || {
        (
            Settings::new(MeshSettings { chunk_size_index: 0, ..MeshSettings::default() }),
            Settings::new(ErosionSettings { num_iterations: 3_000, ..ErosionSettings::default() }),
        )
    };
    let (mesh, erosion) = settings();
    let mut eroded = PreviewController::new(mesh, Settings::default(), erosion, Settings::default())
        .with_erosion(HydraulicErosion::new());
    eroded.generate_preview().unwrap();

    let (mesh, erosion) = settings();
    let mut plain = PreviewController::new(mesh, Settings::default(), erosion, Settings::default())
        .with_erosion(RecordingErosion::default());
    plain.generate_preview().unwrap();

    assert_ne!(eroded.height_map().unwrap(), plain.height_map().unwrap());
}

#[test]
fn failed_redraw_still_applies_later_texture_edits() {
    let mut preview = PreviewController::new(
        Settings::new(MeshSettings { chunk_size_index: 0, ..MeshSettings::default() }),
        Settings::new(HeightMapSettings { use_erosion: true, ..HeightMapSettings::default() }),
        Settings::default(),
        Settings::default(),
    );
    preview.mesh_settings().update(|m| m.mesh_scale = 3.0);
    preview.texture_settings().update(|t| t.layers.truncate(2));

    assert!(matches!(
        preview.process_pending_changes(),
        Err(PreviewError::MissingCollaborator("erosion engine"))
    ));
    assert_eq!(preview.material().layer_count(), 2);
    assert_eq!(preview.process_pending_changes().unwrap(), 0);
}

#[test]
fn edits_queued_on_a_replaced_handle_are_ignored() {
    let mut h = harness(2, false);
    let old = h.preview.mesh_settings().clone();
    old.update(|m| m.mesh_scale = 4.0);

    h.preview
        .set_mesh_settings(Settings::new(MeshSettings { chunk_size_index: 0, ..MeshSettings::default() }))
        .unwrap();
    assert_eq!(h.preview.process_pending_changes().unwrap(), 0);
    assert!(h.sizes.lock().unwrap().is_empty());

    // The new handle still drives redraws.
    h.preview.mesh_settings().update(|m| m.mesh_scale = 5.0);
    assert_eq!(h.preview.process_pending_changes().unwrap(), 1);
}
