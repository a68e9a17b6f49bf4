use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vchan_core::service::ChannelService;

/// Delay before the first automatic channel update.
const AUTO_CHANNEL_FIRST_RUN: Duration = Duration::from_secs(60);

/// Keeps every channel scheduled ahead. Runs once immediately, then every
/// `period`.
pub fn spawn_refresher(
    service: Arc<ChannelService>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let report = service.refresh(Utc::now(), &cancel).await;
            let failed = report.values().filter(|r| r.is_err()).count();
            if failed > 0 {
                error!("Guide refresh failed for {} channels", failed);
            }
        }
        debug!("Refresher stopped");
    })
}

/// Periodically logs channel statistics.
pub fn spawn_maintenance(
    service: Arc<ChannelService>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let stats = service.statistics().await;
            info!(
                "Channel statistics - Total: {}, Streaming: {}, Active: {}",
                stats.total_channels, stats.streaming_channels, stats.active_channels
            );
        }
        debug!("Maintenance stopped");
    })
}

/// Regenerates genre and decade channels from the library.
pub fn spawn_auto_channels(
    service: Arc<ChannelService>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + AUTO_CHANNEL_FIRST_RUN, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match service.regenerate_auto_channels().await {
                Ok(count) => info!("Updated auto-generated channels ({})", count),
                Err(e) => error!("Auto channel update failed: {}", e),
            }
        }
        debug!("Auto channel updater stopped");
    })
}
