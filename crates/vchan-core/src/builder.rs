//! Program schedule assembly.
//!
//! Pulls items from the channel's [`ContentQueue`], expands each through the
//! [`CommercialPlanner`] and lays the results end to end along the wall
//! clock until the requested window is covered.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::ScheduleError;
use crate::model::ScheduledProgram;
use crate::planner::CommercialPlanner;
use crate::policy::ChannelPolicy;
use crate::queue::ContentQueue;

/// Consecutive unschedulable items tolerated before a channel is given up
/// for this build.
pub const MAX_CONSECUTIVE_SKIPS: usize = 32;

/// Why a channel's schedule stopped growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStop {
    /// The requested window is covered.
    Filled,
    /// The queue ran dry.
    Exhausted,
    /// The library kept producing items without a usable runtime.
    Stalled,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ChannelSchedule {
    pub channel_id: String,
    pub programs: Vec<ScheduledProgram>,
    pub stop: ScheduleStop,
}

/// Result of one guide build, keyed by channel id. A catalog failure only
/// affects the channel it happened on.
pub type Guide = BTreeMap<String, Result<ChannelSchedule, ScheduleError>>;

pub struct ScheduleBuilder {
    queue: Arc<ContentQueue>,
    planner: Arc<CommercialPlanner>,
}

impl ScheduleBuilder {
    pub fn new(queue: Arc<ContentQueue>, planner: Arc<CommercialPlanner>) -> Self {
        Self { queue, planner }
    }

    pub fn queue(&self) -> &Arc<ContentQueue> {
        &self.queue
    }

    /// Builds every enabled channel over `[window_start, window_end)`.
    ///
    /// Channels are generated concurrently and independently. Cancelling
    /// `cancel` stops all of them at their next item boundary; whatever was
    /// already produced is returned.
    pub async fn build_guide(
        &self,
        policies: &[ChannelPolicy],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Guide {
        let builds = policies.iter().filter(|p| p.enabled).map(|policy| async move {
            let channel_id = policy.channel_id();
            let result = self
                .build_channel(policy, window_start, window_end, cancel)
                .await;
            if let Err(e) = &result {
                error!(channel = %channel_id, "Error generating programs: {}", e);
            }
            (channel_id, result)
        });

        join_all(builds).await.into_iter().collect()
    }

    /// Lays programs for one channel from `from` until the cursor reaches
    /// `until`. The last program may run past `until`.
    pub async fn build_channel(
        &self,
        policy: &ChannelPolicy,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ChannelSchedule, ScheduleError> {
        let mut programs = Vec::new();
        let stop = self
            .build_into(policy, from, until, cancel, &mut programs)
            .await?;
        Ok(ChannelSchedule {
            channel_id: policy.channel_id(),
            programs,
            stop,
        })
    }

    /// Same as [`build_channel`](Self::build_channel), appending to
    /// `programs` as it goes. On error `programs` still holds everything
    /// built before the failure.
    ///
    /// An item taken from the queue is either scheduled or put back, so a
    /// cancellation or a failed commercial draw never loses content.
    pub async fn build_into(
        &self,
        policy: &ChannelPolicy,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        cancel: &CancellationToken,
        programs: &mut Vec<ScheduledProgram>,
    ) -> Result<ScheduleStop, ScheduleError> {
        let channel_id = policy.channel_id();
        let first = programs.len();
        let mut cursor = from;
        let mut skipped = 0usize;

        let stop = loop {
            if cursor >= until {
                break ScheduleStop::Filled;
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break ScheduleStop::Cancelled,
                next = self.queue.next(&channel_id, policy) => next?,
            };
            let Some(item) = next else {
                warn!(channel = %channel_id, "No content available for channel {}", policy.name);
                break ScheduleStop::Exhausted;
            };

            let segments = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.queue.requeue(&channel_id, Arc::clone(&item)).await;
                    break ScheduleStop::Cancelled;
                }
                segments = self.planner.build_segments(&item, policy) => segments,
            };
            let segments = match segments {
                Ok(segments) => segments,
                Err(e) => {
                    self.queue.requeue(&channel_id, item).await;
                    return Err(e.into());
                }
            };

            if segments.is_empty() {
                skipped += 1;
                warn!(channel = %channel_id, "Skipping unschedulable item {}", item.name);
                if skipped >= MAX_CONSECUTIVE_SKIPS {
                    warn!(
                        channel = %channel_id,
                        "Giving up after {} unschedulable items in a row", skipped
                    );
                    break ScheduleStop::Stalled;
                }
                continue;
            }
            skipped = 0;

            let program = ScheduledProgram::new(&channel_id, item, cursor, segments)
                .ok_or(ScheduleError::TimeOverflow)?;
            cursor = program.end;
            programs.push(program);
        };

        debug!(
            channel = %channel_id,
            "Scheduled {} programs ({:?})",
            programs.len() - first,
            stop
        );
        Ok(stop)
    }
}
