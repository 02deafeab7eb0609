mod app;
mod config;
mod controls;
mod icons;
mod theme;
mod video_surface;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::FmtSubscriber;

use app::LumenApp;
use config::{Overrides, PlayerConfig};
use lm_engine::{MpvEngine, MpvLibrary, PlaybackService};

#[derive(Parser, Debug)]
#[command(name = "lumen", version, about = "Lumen video player")]
struct Args {
    /// Media file to open
    media: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Theme name, e.g. dark_teal or light_blue
    #[arg(short, long)]
    theme: Option<String>,

    /// Initial volume (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,

    /// Log GL debug messages and framebuffer checks
    #[arg(long)]
    gl_debug: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,

    /// Path to a libmpv build to use instead of the system one
    #[arg(long)]
    mpv_lib: Option<PathBuf>,

    /// Extra engine option, may be repeated
    #[arg(long = "mpv-option", value_name = "KEY=VALUE", value_parser = config::parse_engine_option)]
    mpv_options: Vec<(String, String)>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };
    config.apply(Overrides {
        theme: args.theme,
        volume: args.volume,
        gl_debug: args.gl_debug,
        log_level: args.log_level,
        mpv_options: args.mpv_options,
    });

    FmtSubscriber::builder()
        .with_max_level(config.tracing_level())
        .compact()
        .init();

    tracing::info!("Lumen starting...");

    let theme = theme::resolve(&config.theme, &config.custom_themes)?;

    let lib = match &args.mpv_lib {
        Some(path) => MpvLibrary::load_from(path),
        None => MpvLibrary::load(),
    }
    .context("libmpv is required for playback")?;
    let engine = Arc::new(MpvEngine::new(Arc::new(lib), &config.engine_options())?);
    let service = PlaybackService::start(engine)?;

    let options = eframe::NativeOptions {
        renderer: eframe::Renderer::Glow,
        viewport: egui::ViewportBuilder::default()
            .with_title("Lumen")
            .with_inner_size([1280.0, 760.0])
            .with_min_inner_size([480.0, 320.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let media = args.media;
    eframe::run_native(
        "Lumen",
        options,
        Box::new(move |cc| {
            let app = LumenApp::new(cc, &config, theme, service, media)?;
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {e}"))?;

    Ok(())
}
