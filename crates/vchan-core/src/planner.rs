//! Commercial break planning.
//!
//! Expands one content item into the ordered segment list that is actually
//! broadcast:
//!
//! ```text
//! [PreRoll x2] [Content, Commercial x3]* [Content]
//! ```
//!
//! Offset lookup and program durations depend on exactly this order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::CatalogError;
use crate::model::{ContentItem, ScheduledSegment, SegmentKind};
use crate::policy::ChannelPolicy;
use crate::queue::ContentQueue;

pub const PRE_ROLL_COUNT: usize = 2;
pub const MID_ROLL_COUNT: usize = 3;

/// Content shorter than this never gets mid-roll breaks.
pub const MIN_BREAKABLE_RUNTIME: Duration = Duration::from_secs(10 * 60);

/// No break is placed inside the final stretch of an item.
pub const END_GUARD: Duration = Duration::from_secs(5 * 60);

pub struct CommercialPlanner {
    queue: Arc<ContentQueue>,
    commercial_pool: Option<PathBuf>,
}

impl CommercialPlanner {
    /// `commercial_pool` is the library folder commercials are drawn from;
    /// without one, content is still split at break points but no adverts
    /// are inserted.
    pub fn new(queue: Arc<ContentQueue>, commercial_pool: Option<PathBuf>) -> Self {
        Self {
            queue,
            commercial_pool: commercial_pool.filter(|p| !p.as_os_str().is_empty()),
        }
    }

    /// Segments covering `item` end to end. Empty when the item has no
    /// positive runtime; callers skip such items.
    pub async fn build_segments(
        &self,
        item: &Arc<ContentItem>,
        policy: &ChannelPolicy,
    ) -> Result<Vec<ScheduledSegment>, CatalogError> {
        let Some(runtime) = item.runtime() else {
            warn!("Content {} has no valid runtime", item.name);
            return Ok(Vec::new());
        };

        let mut segments = Vec::new();

        if policy.pre_rolls {
            for ad in self.draw(PRE_ROLL_COUNT).await? {
                push_advert(&mut segments, SegmentKind::PreRoll, ad);
            }
        }

        let breaks = break_positions(runtime, policy.commercial_interval());
        let mut cursor = Duration::ZERO;
        for position in &breaks {
            segments.push(ScheduledSegment::content(
                Arc::clone(item),
                cursor,
                *position - cursor,
            ));
            for ad in self.draw(MID_ROLL_COUNT).await? {
                push_advert(&mut segments, SegmentKind::Commercial, ad);
            }
            cursor = *position;
        }

        if cursor < runtime {
            segments.push(ScheduledSegment::content(
                Arc::clone(item),
                cursor,
                runtime - cursor,
            ));
        }

        debug!(
            "Built playlist for {} with {} segments ({} commercial breaks)",
            item.name,
            segments.len(),
            breaks.len()
        );
        Ok(segments)
    }

    async fn draw(&self, count: usize) -> Result<Vec<Arc<ContentItem>>, CatalogError> {
        match &self.commercial_pool {
            Some(pool) => self.queue.commercials(pool, count).await,
            None => Ok(Vec::new()),
        }
    }
}

fn push_advert(segments: &mut Vec<ScheduledSegment>, kind: SegmentKind, ad: Arc<ContentItem>) {
    // Pool entries always carry a runtime.
    if let Some(duration) = ad.runtime() {
        segments.push(ScheduledSegment::advert(kind, ad, duration));
    }
}

/// Mid-roll break offsets for an item of `runtime`: every `interval`,
/// strictly before `runtime - END_GUARD`. None for short items or a zero
/// interval.
pub fn break_positions(runtime: Duration, interval: Duration) -> Vec<Duration> {
    if runtime < MIN_BREAKABLE_RUNTIME || interval.is_zero() {
        return Vec::new();
    }

    let limit = runtime - END_GUARD;
    let mut positions = Vec::new();
    let mut position = interval;
    while position < limit {
        positions.push(position);
        position += interval;
    }
    positions
}
