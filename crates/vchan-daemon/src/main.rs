mod http;
mod tasks;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vchan_core::catalog::LibraryCatalog;
use vchan_core::config::Config;
use vchan_core::service::ChannelService;
use vchan_core::CatalogError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // File log + stderr
    let data_dir = vchan_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,vchan_daemon=debug,vchan_core=debug")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let catalog = match LibraryCatalog::load(&config.library.catalog_file) {
        Ok(catalog) => catalog,
        Err(CatalogError::Io { path, source }) if source.kind() == std::io::ErrorKind::NotFound => {
            warn!("Library file {:?} not found, starting with an empty library", path);
            LibraryCatalog::default()
        }
        Err(e) => return Err(e.into()),
    };

    let service = Arc::new(ChannelService::new(Arc::new(catalog), &config));
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();

    if config.http.enabled {
        handles.push(http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            service.clone(),
            cancel.clone(),
        ));
    }

    handles.push(tasks::spawn_refresher(
        service.clone(),
        Duration::from_secs(config.guide.refresh_interval_secs.max(1)),
        cancel.clone(),
    ));
    handles.push(tasks::spawn_maintenance(
        service.clone(),
        Duration::from_secs(config.guide.maintenance_interval_secs.max(1)),
        cancel.clone(),
    ));
    if config.auto_channels.enabled {
        handles.push(tasks::spawn_auto_channels(
            service.clone(),
            Duration::from_secs(config.auto_channels.update_interval_secs.max(1)),
            cancel.clone(),
        ));
    }

    info!(
        "Daemon initialised with {} configured channels",
        service.policies().await.len()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
