use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::model::ScheduledProgram;

/// A channel counts as active when it was touched within this many minutes.
pub const ACTIVE_WINDOW_MINUTES: i64 = 5;

/// Live state of one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelState {
    pub channel_id: String,
    pub current_program: Option<Arc<ScheduledProgram>>,
    pub streaming: bool,
    pub last_update: DateTime<Utc>,
}

impl ChannelState {
    fn new(channel_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            current_program: None,
            streaming: false,
            last_update: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStatistics {
    pub total_channels: usize,
    pub streaming_channels: usize,
    pub active_channels: usize,
}

type Entry = Arc<RwLock<ChannelState>>;

/// Registry of per-channel live state.
///
/// Every channel has its own lock; the outer map lock is only held long
/// enough to find or insert an entry. Snapshots copy each entry out one at a
/// time, so a reader never blocks all writers at once.
#[derive(Default)]
pub struct ChannelStateStore {
    channels: RwLock<HashMap<String, Entry>>,
}

impl ChannelStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing state, or a fresh idle entry created atomically.
    pub async fn get_or_create(&self, channel_id: &str) -> ChannelState {
        let entry = self.entry(channel_id).await;
        let state = entry.read().await;
        state.clone()
    }

    pub async fn get(&self, channel_id: &str) -> Option<ChannelState> {
        let entry = self.channels.read().await.get(channel_id).cloned()?;
        let state = entry.read().await;
        Some(state.clone())
    }

    pub async fn set_current_program(&self, channel_id: &str, program: Arc<ScheduledProgram>) {
        let entry = self.entry(channel_id).await;
        let mut state = entry.write().await;
        debug!(
            channel = %channel_id,
            "Updated current program: {}",
            program.item.name
        );
        state.current_program = Some(program);
        state.last_update = Utc::now();
    }

    pub async fn current_program(&self, channel_id: &str) -> Option<Arc<ScheduledProgram>> {
        self.get(channel_id).await?.current_program
    }

    pub async fn set_streaming(&self, channel_id: &str, streaming: bool) {
        let entry = self.entry(channel_id).await;
        let mut state = entry.write().await;
        state.streaming = streaming;
        state.last_update = Utc::now();
        info!(channel = %channel_id, "Streaming state: {}", streaming);
    }

    pub async fn is_streaming(&self, channel_id: &str) -> bool {
        self.get(channel_id).await.map(|s| s.streaming).unwrap_or(false)
    }

    /// Point-in-time copy of every channel's state.
    pub async fn snapshot_all(&self) -> HashMap<String, ChannelState> {
        let entries: Vec<(String, Entry)> = {
            let channels = self.channels.read().await;
            channels
                .iter()
                .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
                .collect()
        };

        let mut snapshot = HashMap::with_capacity(entries.len());
        for (id, entry) in entries {
            let state = entry.read().await.clone();
            snapshot.insert(id, state);
        }
        snapshot
    }

    pub async fn clear(&self, channel_id: &str) {
        if self.channels.write().await.remove(channel_id).is_some() {
            info!(channel = %channel_id, "Cleared state");
        }
    }

    pub async fn clear_all(&self) {
        self.channels.write().await.clear();
        info!("Cleared all channel states");
    }

    pub async fn statistics(&self) -> ChannelStatistics {
        self.statistics_at(Utc::now()).await
    }

    /// Statistics as observed at `now`.
    pub async fn statistics_at(&self, now: DateTime<Utc>) -> ChannelStatistics {
        let snapshot = self.snapshot_all().await;
        let cutoff = now - TimeDelta::minutes(ACTIVE_WINDOW_MINUTES);
        ChannelStatistics {
            total_channels: snapshot.len(),
            streaming_channels: snapshot.values().filter(|s| s.streaming).count(),
            active_channels: snapshot.values().filter(|s| s.last_update > cutoff).count(),
        }
    }

    async fn entry(&self, channel_id: &str) -> Entry {
        if let Some(entry) = self.channels.read().await.get(channel_id) {
            return Arc::clone(entry);
        }
        let mut channels = self.channels.write().await;
        Arc::clone(
            channels
                .entry(channel_id.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(ChannelState::new(channel_id, Utc::now())))),
        )
    }
}
