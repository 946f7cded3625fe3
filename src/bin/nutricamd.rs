//! nutricamd - food camera web service
//!
//! This daemon:
//! 1. Loads configuration (file + environment)
//! 2. Builds the classifier and the nutrition database client
//! 3. Serves the index page, live feed, capture action, and result page

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::{mpsc, Arc};

use nutricam::{
    classify::{ClassifierRegistry, LabelSet},
    config::NutricamConfig,
    server::{AppState, ServerConfig, WebServer},
    stream::MjpegEncoder,
    CapturePipeline, FrameSlot, UsdaClient,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Live camera food classifier with nutrition lookup")]
struct Args {
    /// Listen address (host:port).
    #[arg(long, env = "NUTRICAM_ADDR")]
    addr: Option<String>,

    /// Camera: a V4L2 device path, `stub://<name>`, or `file://<image>`.
    #[arg(long, env = "NUTRICAM_CAMERA")]
    camera: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = NutricamConfig::load()?;
    if let Some(addr) = args.addr {
        config.addr = addr;
    }
    if let Some(camera) = args.camera {
        config.camera.url = camera;
    }

    let registry = ClassifierRegistry::from_settings(&config.classifier)?;
    registry.warm_up()?;
    let classifier = registry
        .default_classifier()
        .ok_or_else(|| anyhow!("no classifier registered"))?;
    log::info!(
        "classifier backends {:?}, using '{}'",
        registry.list(),
        registry.default_name().unwrap_or("-")
    );

    let slot = Arc::new(FrameSlot::new());
    let nutrition = Arc::new(UsdaClient::new(config.usda.clone()));
    let pipeline = CapturePipeline::new(
        slot.clone(),
        &config.upload_dir,
        LabelSet::food(),
        classifier,
        nutrition,
    )
    .with_jpeg_quality(config.jpeg_quality);
    log::info!("captured images go to {}", pipeline.image_path().display());

    let state = AppState::new(slot, config.camera.clone(), pipeline)
        .with_encoder(MjpegEncoder::new(config.jpeg_quality));
    let handle = WebServer::new(
        ServerConfig {
            addr: config.addr.clone(),
        },
        state,
    )
    .spawn()?;
    log::info!(
        "nutricamd running on http://{} (camera {})",
        handle.addr,
        config.camera.url
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("nutricamd waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping web server...");
    handle.stop()?;

    Ok(())
}
