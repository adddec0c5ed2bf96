use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use hardway::audio::SilentAudio;
use hardway::error::AppError;
use hardway::textures::ImageTextureLoader;
use hardway::{Config, HeadlessBackend, RenderLoop, SceneContext, SceneId};

#[derive(Parser)]
#[command(name = "hardway")]
#[command(about = "Parallax, pixel lighting and falling-sand scenes on one GPU render loop", long_about = None)]
#[command(version)]
struct Cli {
    /// Scene to start with (parallax, pixel-lighting, cellular-sand)
    #[arg(short, long)]
    scene: Option<SceneId>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding textures and audio
    #[arg(short, long)]
    assets: Option<PathBuf>,

    /// Render this many frames without a window, then exit
    #[arg(long, value_name = "FRAMES")]
    headless: Option<u64>,

    /// Write the effective configuration (file plus flags) as JSON, then exit
    #[arg(long, value_name = "PATH")]
    save_config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(scene) = cli.scene {
        config = config.with_initial_scene(scene);
    }
    if let Some(assets) = cli.assets {
        config = config.with_asset_dir(assets);
    }

    if let Some(path) = &cli.save_config {
        config.save(path)?;
        log::info!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    match cli.headless {
        Some(frames) => {
            run_headless(&config, frames);
            Ok(())
        }
        None => hardway::window::run(config),
    }
}

fn run_headless(config: &Config, frames: u64) {
    let context = SceneContext::new(
        Arc::new(ImageTextureLoader::new(&config.asset_dir)),
        Arc::new(SilentAudio),
    )
    .with_sand(config.sand.clone());

    let mut render_loop = RenderLoop::new(
        HeadlessBackend::default(),
        context.build(config.initial_scene),
        config.pipeline_policy,
    );
    log::info!("Rendering {} headless frames of '{}'", frames, config.initial_scene);

    for _ in 0..frames {
        render_loop.frame();
        render_loop.backend_mut().take_frames();
    }

    let stats = render_loop.stats();
    log::info!(
        "{} frames: {} drawn, {} skipped, {:.1} fps",
        stats.frames,
        stats.drawn,
        stats.skipped,
        stats.fps
    );
    if let Some(info) = render_loop.active_scene().debug_info() {
        log::info!("{}", info);
    }
}
