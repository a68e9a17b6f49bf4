//! Channel line-up facade used by the daemon.
//!
//! Every channel keeps a [`CommittedTimeline`]. Guide queries, tune-ins and
//! the periodic refresher all read from it and only pull new items from the
//! content queue when a request reaches past the committed horizon, so
//! repeated or overlapping guide calls see the same programs.

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::future::join_all;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::autogen;
use crate::builder::{ScheduleBuilder, ScheduleStop};
use crate::catalog::Catalog;
use crate::committed::CommittedTimeline;
use crate::config::{AutoChannelConfig, Config};
use crate::error::{CatalogError, ScheduleError};
use crate::guide::GuideChannel;
use crate::model::{ScheduledProgram, ScheduledSegment};
use crate::planner::CommercialPlanner;
use crate::policy::ChannelPolicy;
use crate::queue::ContentQueue;
use crate::state::{ChannelStateStore, ChannelStatistics};
use crate::timeline;

/// Programs per channel for one guide window.
pub type GuideWindow = BTreeMap<String, Result<Vec<ScheduledProgram>, ScheduleError>>;

/// Outcome of one refresh pass, per channel.
pub type RefreshReport = BTreeMap<String, Result<ScheduleStop, ScheduleError>>;

/// What a viewer tuning in at a given instant should be shown.
#[derive(Debug, Clone, Serialize)]
pub struct TuneIn {
    pub program: Arc<ScheduledProgram>,
    pub segment_index: usize,
    pub segment: ScheduledSegment,
    /// Offset from the start of `segment`.
    #[serde(with = "crate::model::secs")]
    pub offset: Duration,
    /// Where to seek inside the segment's media file.
    #[serde(with = "crate::model::secs")]
    pub media_offset: Duration,
}

type TimelineSlot = Arc<Mutex<CommittedTimeline>>;

pub struct ChannelService {
    policies: RwLock<Vec<ChannelPolicy>>,
    builder: ScheduleBuilder,
    states: ChannelStateStore,
    timelines: RwLock<HashMap<String, TimelineSlot>>,
    auto_channels: AutoChannelConfig,
    days_ahead: u32,
}

impl ChannelService {
    pub fn new(catalog: Arc<dyn Catalog>, config: &Config) -> Self {
        Self::with_queue(Arc::new(ContentQueue::new(catalog)), config)
    }

    /// Seeded variant for reproducible shuffles and commercial draws.
    pub fn with_rng(catalog: Arc<dyn Catalog>, config: &Config, rng: StdRng) -> Self {
        Self::with_queue(Arc::new(ContentQueue::with_rng(catalog, rng)), config)
    }

    fn with_queue(queue: Arc<ContentQueue>, config: &Config) -> Self {
        let planner = Arc::new(CommercialPlanner::new(
            queue.clone(),
            config.library.commercial_folder.clone(),
        ));
        Self {
            policies: RwLock::new(unique_numbers(config.channels.clone())),
            builder: ScheduleBuilder::new(queue, planner),
            states: ChannelStateStore::new(),
            timelines: RwLock::new(HashMap::new()),
            auto_channels: config.auto_channels.clone(),
            days_ahead: config.guide.days_ahead,
        }
    }

    pub fn states(&self) -> &ChannelStateStore {
        &self.states
    }

    pub async fn policies(&self) -> Vec<ChannelPolicy> {
        self.policies.read().await.clone()
    }

    pub async fn enabled_policies(&self) -> Vec<ChannelPolicy> {
        self.policies
            .read()
            .await
            .iter()
            .filter(|p| p.enabled)
            .cloned()
            .collect()
    }

    pub async fn policy(&self, channel_id: &str) -> Option<ChannelPolicy> {
        self.policies
            .read()
            .await
            .iter()
            .find(|p| p.channel_id() == channel_id)
            .cloned()
    }

    /// Replaces the line-up. Channels that disappear lose their queue and
    /// committed timeline. When several channels share a number only the
    /// first is kept.
    pub async fn set_policies(&self, policies: Vec<ChannelPolicy>) {
        let policies = unique_numbers(policies);
        let keep: HashSet<String> = policies.iter().map(|p| p.channel_id()).collect();
        *self.policies.write().await = policies;

        let removed: Vec<String> = {
            let mut timelines = self.timelines.write().await;
            let gone: Vec<String> = timelines
                .keys()
                .filter(|id| !keep.contains(*id))
                .cloned()
                .collect();
            for id in &gone {
                timelines.remove(id);
            }
            gone
        };
        for id in &removed {
            self.builder.queue().clear(id).await;
            self.states.clear(id).await;
        }
        info!("Channel line-up now has {} channels", keep.len());
    }

    pub async fn guide_channels(&self) -> Vec<GuideChannel> {
        self.enabled_policies()
            .await
            .iter()
            .map(GuideChannel::from)
            .collect()
    }

    /// Programs overlapping `[window_start, window_end)` for every enabled
    /// channel as seen at `now`, extending committed timelines as needed.
    ///
    /// An empty timeline starts at the earlier of `window_start` and `now`.
    /// A window beyond the horizon is reached by extending the live timeline,
    /// never by discarding it. The first program listed may have started
    /// before the window if it is still on air. On cancellation each channel
    /// returns what it had committed so far.
    pub async fn guide(
        &self,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> GuideWindow {
        let policies = self.enabled_policies().await;
        let builds = policies.iter().map(|policy| async move {
            let channel_id = policy.channel_id();
            let slot = self.timeline(&channel_id).await;
            let mut timeline = slot.lock().await;

            let result = self
                .extend(policy, &mut timeline, now, window_start, window_end, cancel)
                .await
                .map(|_| timeline.window(window_start, window_end));
            if let Err(e) = &result {
                error!(channel = %channel_id, "Error generating programs: {}", e);
            }
            (channel_id, result)
        });

        join_all(builds).await.into_iter().collect()
    }

    /// Answers "what is on right now" for a viewer joining `channel_id` at
    /// `now`, and marks the channel as streaming that program.
    ///
    /// `Ok(None)` when the channel has nothing to play.
    pub async fn tune_in(
        &self,
        channel_id: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Option<TuneIn>, ScheduleError> {
        let policy = self
            .policy(channel_id)
            .await
            .ok_or_else(|| ScheduleError::UnknownChannel(channel_id.to_string()))?;
        if !policy.enabled {
            debug!(channel = %channel_id, "Channel is disabled");
            return Ok(None);
        }

        let program = {
            let slot = self.timeline(channel_id).await;
            let mut timeline = slot.lock().await;
            let until = now + TimeDelta::seconds(1);
            self.extend(&policy, &mut timeline, now, now, until, cancel).await?;
            match timeline.program_at(now) {
                Some(program) => Arc::new(program.clone()),
                None => {
                    warn!(channel = %channel_id, "Nothing on air for channel {}", policy.name);
                    return Ok(None);
                }
            }
        };

        let Some(position) = timeline::locate_at(&program, now) else {
            return Ok(None);
        };
        let tune_in = TuneIn {
            segment_index: position.index,
            segment: position.segment.clone(),
            offset: position.offset,
            media_offset: position.media_offset(),
            program: program.clone(),
        };

        self.states.set_current_program(channel_id, program).await;
        self.states.set_streaming(channel_id, true).await;
        info!(
            channel = %channel_id,
            "Tuned in to {} at {:?}",
            tune_in.segment.item.name,
            tune_in.media_offset
        );
        Ok(Some(tune_in))
    }

    pub async fn stop_streaming(&self, channel_id: &str) {
        self.states.set_streaming(channel_id, false).await;
    }

    /// Drops programs that ended before `now` and keeps every enabled
    /// channel scheduled `days_ahead` into the future.
    pub async fn refresh(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> RefreshReport {
        let until = now + TimeDelta::days(i64::from(self.days_ahead));
        let policies = self.enabled_policies().await;

        let passes = policies.iter().map(|policy| async move {
            let channel_id = policy.channel_id();
            let slot = self.timeline(&channel_id).await;
            let mut timeline = slot.lock().await;

            let pruned = timeline.prune_before(now);
            if pruned > 0 {
                debug!(channel = %channel_id, "Pruned {} finished programs", pruned);
            }
            let result = self
                .extend(policy, &mut timeline, now, now, until, cancel)
                .await;
            if let Err(e) = &result {
                error!(channel = %channel_id, "Error refreshing channel: {}", e);
            }
            (channel_id, result)
        });

        let report: RefreshReport = join_all(passes).await.into_iter().collect();
        info!("Refreshed {} channels", report.len());
        report
    }

    /// Manual refresh: forgets the queue and committed timeline of one
    /// channel, or of every channel when `channel_id` is `None`.
    pub async fn reset(&self, channel_id: Option<&str>) {
        match channel_id {
            Some(id) => {
                self.builder.queue().clear(id).await;
                let slot = self.timelines.read().await.get(id).cloned();
                if let Some(slot) = slot {
                    slot.lock().await.clear();
                }
                info!(channel = %id, "Reset channel");
            }
            None => {
                self.builder.queue().clear_all().await;
                let slots: Vec<TimelineSlot> =
                    self.timelines.read().await.values().cloned().collect();
                for slot in slots {
                    slot.lock().await.clear();
                }
                info!("Reset all channels");
            }
        }
    }

    pub async fn statistics(&self) -> ChannelStatistics {
        self.states.statistics().await
    }

    /// Regenerates genre and decade channels from the library and swaps them
    /// into the live line-up. Returns the number of generated channels.
    pub async fn regenerate_auto_channels(&self) -> Result<usize, CatalogError> {
        let catalog = self.builder.queue().catalog().clone();
        let generated = autogen::generate_auto_channels(catalog.as_ref(), &self.auto_channels).await?;
        let count = generated.len();

        let merged = autogen::merge_auto_channels(&self.policies().await, generated);
        self.set_policies(merged).await;
        Ok(count)
    }

    pub async fn library_genres(&self) -> Result<Vec<String>, CatalogError> {
        let catalog = self.builder.queue().catalog().clone();
        autogen::library_genres(catalog.as_ref()).await
    }

    /// Grows `timeline` until its horizon reaches `until`. Must be called
    /// with the channel's timeline lock held.
    ///
    /// Programs built before a catalog failure are committed before the
    /// error is returned; their items have already left the queue.
    async fn extend(
        &self,
        policy: &ChannelPolicy,
        timeline: &mut CommittedTimeline,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
        until: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ScheduleStop, ScheduleError> {
        let from = timeline.resume_point(window_start, now);
        if from >= until {
            return Ok(ScheduleStop::Filled);
        }

        let mut programs = Vec::new();
        let result = self
            .builder
            .build_into(policy, from, until, cancel, &mut programs)
            .await;
        if result.is_err() && !programs.is_empty() {
            warn!(
                channel = %policy.channel_id(),
                "Keeping {} programs built before the failure",
                programs.len()
            );
        }
        timeline.extend(programs);
        result
    }

    async fn timeline(&self, channel_id: &str) -> TimelineSlot {
        if let Some(slot) = self.timelines.read().await.get(channel_id) {
            return Arc::clone(slot);
        }
        let mut timelines = self.timelines.write().await;
        Arc::clone(timelines.entry(channel_id.to_string()).or_default())
    }
}

/// Keeps the first channel for every number. The channel id is derived from
/// the number, so a second channel with the same number would share its
/// queue, timeline and state.
fn unique_numbers(policies: Vec<ChannelPolicy>) -> Vec<ChannelPolicy> {
    let mut seen = HashSet::new();
    policies
        .into_iter()
        .filter(|policy| {
            let fresh = seen.insert(policy.number);
            if !fresh {
                warn!(
                    "Ignoring channel {} ({}): number already in use",
                    policy.name, policy.number
                );
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LibraryCatalog;
    use crate::model::ContentItem;
    use crate::policy::ChannelKind;
    use rand::SeedableRng;

    fn service(channels: Vec<ChannelPolicy>) -> ChannelService {
        let items = (0..6).map(|i| ContentItem::new(format!("movie{i}"), Duration::from_secs(3600)));
        let catalog: Arc<dyn Catalog> = Arc::new(LibraryCatalog::from_items(items));
        let config = Config {
            channels,
            ..Config::default()
        };
        ChannelService::with_rng(catalog, &config, StdRng::seed_from_u64(7))
    }

    #[tokio::test]
    async fn test_unknown_channel_is_an_error() {
        let service = service(vec![]);
        let result = service
            .tune_in("virtual_9", Utc::now(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ScheduleError::UnknownChannel(_))));
    }

    #[tokio::test]
    async fn test_disabled_channel_never_streams() {
        let mut policy = ChannelPolicy::new("Off", 1, ChannelKind::All);
        policy.enabled = false;
        let service = service(vec![policy]);

        let tune_in = service
            .tune_in("virtual_1", Utc::now(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(tune_in.is_none());
        assert!(!service.states().is_streaming("virtual_1").await);
    }

    #[tokio::test]
    async fn test_refresh_covers_days_ahead() {
        let service = service(vec![ChannelPolicy::new("Movies", 1, ChannelKind::All)]);
        let now = Utc::now();

        let report = service.refresh(now, &CancellationToken::new()).await;
        assert_eq!(report["virtual_1"].as_ref().unwrap(), &ScheduleStop::Filled);

        let guide = service
            .guide(now, now, now + TimeDelta::days(3), &CancellationToken::new())
            .await;
        let programs = guide["virtual_1"].as_ref().unwrap();
        assert_eq!(programs.len(), 72);
        assert_eq!(programs[0].start, now);
    }

    #[tokio::test]
    async fn test_removed_channels_drop_their_timeline() {
        let service = service(vec![
            ChannelPolicy::new("One", 1, ChannelKind::All),
            ChannelPolicy::new("Two", 2, ChannelKind::All),
        ]);
        let now = Utc::now();
        service
            .guide(now, now, now + TimeDelta::hours(2), &CancellationToken::new())
            .await;

        service
            .set_policies(vec![ChannelPolicy::new("One", 1, ChannelKind::All)])
            .await;
        assert!(!service.timelines.read().await.contains_key("virtual_2"));
        assert_eq!(service.guide_channels().await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_numbers_keep_the_first_channel() {
        let service = service(vec![
            ChannelPolicy::new("Mine", 1000, ChannelKind::Custom),
            ChannelPolicy::new("Other", 1000, ChannelKind::All),
            ChannelPolicy::new("Movies", 1, ChannelKind::All),
        ]);
        let names: Vec<_> = service.policies().await.into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["Mine", "Movies"]);

        service
            .set_policies(vec![
                ChannelPolicy::new("Movies", 1, ChannelKind::All),
                ChannelPolicy::new("Again", 1, ChannelKind::Custom),
            ])
            .await;
        let names: Vec<_> = service.policies().await.into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["Movies"]);
    }

    #[tokio::test]
    async fn test_future_guide_keeps_the_program_on_air() {
        let service = service(vec![ChannelPolicy::new("Movies", 1, ChannelKind::All)]);
        let now = Utc::now();
        let cancel = CancellationToken::new();

        let before = service
            .guide(now, now, now + TimeDelta::hours(2), &cancel)
            .await;
        let tomorrow = now + TimeDelta::days(1);
        let ahead = service
            .guide(now, tomorrow, tomorrow + TimeDelta::hours(2), &cancel)
            .await;
        let after = service
            .guide(now, now, now + TimeDelta::hours(2), &cancel)
            .await;

        let before = before["virtual_1"].as_ref().unwrap();
        let ahead = ahead["virtual_1"].as_ref().unwrap();
        let after = after["virtual_1"].as_ref().unwrap();
        let ids = |programs: &[ScheduledProgram]| -> Vec<String> {
            programs.iter().map(|p| p.id.clone()).collect()
        };
        assert_eq!(ids(before), ids(after));
        assert!(ahead[0].start <= tomorrow);

        let on_air = service
            .tune_in("virtual_1", now + TimeDelta::minutes(5), &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(on_air.program.id, before[0].id);
    }
}
