use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use config::Config;
use dbus_interface::AttendanceService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::load();
    tracing::info!(
        db_path = %config.db_path.display(),
        model_dir = %config.model_dir.display(),
        confidence_threshold = config.confidence_threshold,
        match_tolerance = config.match_tolerance,
        "configuration loaded"
    );

    // Fail fast: models must load before we accept requests.
    let engine = engine::spawn_engine(
        &config.detector_model_path(),
        &config.embedder_model_path(),
        config.confidence_threshold,
    )?;

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("creating data directory")?;
    }
    let db = tokio_rusqlite::Connection::open(&config.db_path)
        .await
        .context("opening database")?;
    let schema: Result<(), rollcall_store::StoreError> = db
        .call(|conn| Ok(rollcall_store::init_schema(conn)))
        .await?;
    schema.context("initializing schema")?;
    tracing::info!("database ready");

    let service = AttendanceService::new(engine, db, config);
    let _conn = zbus::connection::Builder::session()?
        .name("org.rollcall.Attendance1")?
        .serve_at("/org/rollcall/Attendance1", service)?
        .build()
        .await
        .context("registering D-Bus service")?;

    tracing::info!("rollcalld ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
