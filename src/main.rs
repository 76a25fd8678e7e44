// src/main.rs

use anyhow::{Context, Result};
use spatial_alerts::replay::Scene;
use spatial_alerts::{run_session, Config, LogAnnouncer, LogRenderer, Session};
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "config.yaml";
const DEFAULT_SCENE: &str = "demos/approaching_person.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("SPATIAL_ALERTS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let scene_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SPATIAL_ALERTS_SCENE").ok())
        .unwrap_or_else(|| DEFAULT_SCENE.to_string());

    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .init();

    info!("🦯 Spatial alerts replay starting");
    if !Path::new(&config_path).exists() {
        warn!("{} not found, using built-in defaults", config_path);
    } else {
        info!("✓ Configuration loaded from {}", config_path);
    }

    let scene = Scene::load(&scene_path)?;
    let tick_interval = Duration::from_secs_f64(scene.frame_interval_ms / 1000.0);
    info!(
        "Scene {}: {} frames at {}x{}, {:.0}ms apart",
        scene_path,
        scene.frame_count(),
        scene.frame_width,
        scene.frame_height,
        scene.frame_interval_ms
    );
    let (source, detector) = scene.into_replay();

    let session = Session::new(config).context("Failed to start session")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping session");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut announcer = LogAnnouncer::default();
    let mut renderer = LogRenderer::default();
    let session = run_session(
        session,
        source,
        detector,
        &mut announcer,
        &mut renderer,
        shutdown_rx,
        tick_interval,
    )
    .await?;

    info!(
        "✓ Replay finished: {} alerts announced ({} interrupting)",
        announcer.announced, announcer.interrupted
    );
    let summary = session.metrics().summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
