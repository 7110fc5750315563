use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::post};
use base64::Engine;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tracing::{error, info};

use terrain_preview::config::{ErosionSettings, HeightMapSettings, MeshSettings, TextureSettings};
use terrain_preview::erosion::HydraulicErosion;
use terrain_preview::render::render_material;
use terrain_preview::vegetation::{ScatterSpawner, VegetationInstance};
use terrain_preview::{DrawMode, PreviewConfig, PreviewController, PreviewError, logging};

type SharedPreview = Arc<Mutex<PreviewController>>;

/// Inspector edit. Only the sections that changed are sent.
#[derive(Deserialize)]
struct PreviewRequest {
    draw_mode: Option<DrawMode>,
    editor_lod: Option<usize>,
    mesh: Option<MeshSettings>,
    height_map: Option<HeightMapSettings>,
    erosion: Option<ErosionSettings>,
    texture: Option<TextureSettings>,
}

#[derive(Serialize)]
struct PreviewResponse {
    draw_mode: DrawMode,
    data_url: String,
    width: u32,
    height: u32,
    mesh: Option<MeshStats>,
    redraws: usize,
    timings: Vec<TimingEntry>,
}

#[derive(Serialize)]
struct MeshStats {
    vertices: usize,
    triangles: usize,
}

#[derive(Serialize)]
struct TimingEntry {
    name: String,
    ms: f64,
}

struct ApiError(StatusCode, String);

impl From<PreviewError> for ApiError {
    fn from(e: PreviewError) -> Self {
        let status = match e {
            PreviewError::NoPriorGeneration | PreviewError::InvalidLod { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(status = %self.0, "{}", self.1);
        (self.0, self.1).into_response()
    }
}

fn encode_png(img: &image::RgbaImage) -> Result<String, PreviewError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(img, img.width(), img.height(), image::ExtendedColorType::Rgba8)?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(&buf);
    Ok(format!("data:image/png;base64,{}", b64))
}

fn apply_request(preview: &mut PreviewController, req: PreviewRequest) -> Result<PreviewResponse, PreviewError> {
    // Settings edits queue change notifications; the controller redraws once per edit.
    if let Some(mesh) = req.mesh {
        preview.mesh_settings().replace(mesh);
    }
    if let Some(height_map) = req.height_map {
        preview.height_map_settings().replace(height_map);
    }
    if let Some(erosion) = req.erosion {
        preview.erosion_settings().replace(erosion);
    }
    if let Some(texture) = req.texture {
        preview.texture_settings().replace(texture);
    }
    if let Some(mode) = req.draw_mode {
        preview.set_draw_mode(mode)?;
    }
    if let Some(lod) = req.editor_lod {
        preview.set_editor_lod(lod)?;
    }

    let redraws = preview.process_pending_changes()?;
    if redraws == 0 {
        preview.generate_preview()?;
    }

    let draw_mode = preview.draw_mode();
    let (image, mesh) = match draw_mode {
        DrawMode::Mesh => {
            let height_map = preview.height_map().ok_or(PreviewError::NoPriorGeneration)?;
            let cell = preview.mesh_settings().read(|m| m.mesh_scale);
            let image = render_material(height_map, preview.material(), cell);
            let stats = preview.mesh_surface().mesh.as_ref().map(|m| MeshStats {
                vertices: m.vertex_count(),
                triangles: m.triangle_count(),
            });
            (image, stats)
        }
        DrawMode::NoiseMap | DrawMode::FalloffMap => {
            let image = preview
                .texture_surface()
                .texture
                .clone()
                .ok_or(PreviewError::NoPriorGeneration)?;
            (image, None)
        }
    };

    Ok(PreviewResponse {
        draw_mode,
        data_url: encode_png(&image)?,
        width: image.width(),
        height: image.height(),
        mesh,
        redraws,
        timings: preview
            .last_timings()
            .iter()
            .map(|t| TimingEntry { name: t.name.to_string(), ms: t.ms })
            .collect(),
    })
}

async fn preview_handler(
    State(preview): State<SharedPreview>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let response = tokio::task::spawn_blocking(move || {
        let mut preview = preview.lock().unwrap_or_else(PoisonError::into_inner);
        apply_request(&mut preview, req)
    })
    .await
    .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    Ok(Json(response))
}

async fn vegetation_handler(State(preview): State<SharedPreview>) -> Result<Json<Vec<VegetationInstance>>, ApiError> {
    let instances = tokio::task::spawn_blocking(move || {
        preview.lock().unwrap_or_else(PoisonError::into_inner).spawn_vegetation()
    })
    .await
    .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    Ok(Json(instances))
}

#[tokio::main]
async fn main() {
    logging::init_logging();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => match PreviewConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        },
        None => PreviewConfig::default(),
    };

    // Each request decides when to redraw; auto-update would redraw twice.
    let config = PreviewConfig { auto_update: false, ..config };
    let preview = match PreviewController::from_config(&config) {
        Ok(preview) => preview
            .with_erosion(HydraulicErosion::new())
            .with_vegetation_spawner(ScatterSpawner::new(config.vegetation.clone())),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    let state: SharedPreview = Arc::new(Mutex::new(preview));

    let frontend = ServeDir::new("frontend");

    let app = Router::new()
        .route("/api/preview", post(preview_handler))
        .route("/api/vegetation", post(vegetation_handler))
        .fallback_service(frontend)
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("terrain preview server at http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("server stopped: {e}");
    }
}
