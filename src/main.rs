use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{error, info};

use terrain_preview::erosion::HydraulicErosion;
use terrain_preview::render::render_material;
use terrain_preview::vegetation::ScatterSpawner;
use terrain_preview::{DrawMode, PreviewConfig, PreviewController, Result, logging};

struct Args {
    config: Option<PathBuf>,
    out_dir: PathBuf,
    spawn: bool,
}

fn parse_args() -> Args {
    let mut positional = Vec::new();
    let mut spawn = false;
    for arg in std::env::args().skip(1) {
        if arg == "--spawn" {
            spawn = true;
        } else {
            positional.push(arg);
        }
    }
    let mut positional = positional.into_iter();
    Args {
        config: positional.next().map(PathBuf::from),
        out_dir: positional
            .next()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("artifacts")),
        spawn,
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => PreviewConfig::load(path)?,
        None => PreviewConfig::default(),
    };
    std::fs::create_dir_all(&args.out_dir)?;

    let mut controller = PreviewController::from_config(&config)?
        .with_erosion(HydraulicErosion::new())
        .with_vegetation_spawner(ScatterSpawner::new(config.vegetation.clone()));

    info!(
        mode = ?config.draw_mode,
        lod = config.editor_lod,
        erosion = config.height_map.use_erosion,
        "rendering preview"
    );
    let timings = controller.generate_preview()?;

    eprintln!("\nTimings:");
    for t in &timings {
        eprintln!("  {:20} {:8.1} ms", t.name, t.ms);
    }

    match controller.draw_mode() {
        DrawMode::NoiseMap | DrawMode::FalloffMap => {
            if let Some(texture) = &controller.texture_surface().texture {
                save_png(texture, &args.out_dir.join("preview.png"))?;
            }
        }
        DrawMode::Mesh => {
            if let Some(mesh) = &controller.mesh_surface().mesh {
                let path = args.out_dir.join("terrain.obj");
                mesh.write_obj(&mut BufWriter::new(File::create(&path)?))?;
                info!(path = %path.display(), vertices = mesh.vertex_count(), "saved mesh");
            }
            if let Some(height_map) = controller.height_map() {
                let shaded = render_material(height_map, controller.material(), config.mesh.mesh_scale);
                save_png(&shaded, &args.out_dir.join("material.png"))?;
            }
        }
    }

    if args.spawn {
        let instances = controller.spawn_vegetation()?;
        let path = args.out_dir.join("vegetation.json");
        serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &instances)
            .map_err(std::io::Error::from)?;
        info!(path = %path.display(), count = instances.len(), "saved vegetation");
    }

    Ok(())
}

fn save_png(img: &image::RgbaImage, path: &Path) -> Result<()> {
    img.save(path)?;
    info!(path = %path.display(), "saved image");
    Ok(())
}

fn main() -> ExitCode {
    logging::init_logging();
    let args = parse_args();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
