//! Per-channel content backlog.
//!
//! Each channel owns an ordered queue of library items. Before every dequeue
//! the queue length is checked and, when it has dropped below
//! [`LOW_WATER_MARK`], the whole queue is replaced by a fresh catalog query.
//! The check, the refill and the dequeue happen under the channel's own lock,
//! so two callers on the same channel can never both refill or race on an
//! empty queue. Other channels are not blocked.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogFilter};
use crate::error::CatalogError;
use crate::model::ContentItem;
use crate::policy::ChannelPolicy;

/// Remaining-item threshold below which a channel's queue is refilled.
pub const LOW_WATER_MARK: usize = 3;

type ChannelSlot = Arc<Mutex<VecDeque<Arc<ContentItem>>>>;

pub struct ContentQueue {
    catalog: Arc<dyn Catalog>,
    queues: RwLock<HashMap<String, ChannelSlot>>,
    rng: Mutex<StdRng>,
}

impl ContentQueue {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self::with_rng(catalog, StdRng::from_entropy())
    }

    /// Use a caller supplied RNG for shuffles and commercial draws.
    pub fn with_rng(catalog: Arc<dyn Catalog>, rng: StdRng) -> Self {
        Self {
            catalog,
            queues: RwLock::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Next item for `channel_id`, refilling first if the backlog is low.
    ///
    /// `Ok(None)` means the queue is empty and the catalog had nothing to
    /// offer; callers stop scheduling the channel.
    pub async fn next(
        &self,
        channel_id: &str,
        policy: &ChannelPolicy,
    ) -> Result<Option<Arc<ContentItem>>, CatalogError> {
        let slot = self.slot(channel_id).await;
        let mut queue = slot.lock().await;

        if queue.len() < LOW_WATER_MARK {
            self.refill(channel_id, policy, &mut queue).await?;
        }

        Ok(queue.pop_front())
    }

    /// Puts an item that was dequeued but never scheduled back at the front
    /// of the channel's queue.
    pub async fn requeue(&self, channel_id: &str, item: Arc<ContentItem>) {
        let slot = self.slot(channel_id).await;
        slot.lock().await.push_front(item);
        debug!(channel = %channel_id, "Requeued unscheduled item");
    }

    /// Replaces the queue contents with a fresh selection. An empty selection
    /// leaves the old contents in place.
    async fn refill(
        &self,
        channel_id: &str,
        policy: &ChannelPolicy,
        queue: &mut VecDeque<Arc<ContentItem>>,
    ) -> Result<(), CatalogError> {
        let selection = match policy.selection_filter() {
            Ok(selection) => selection,
            Err(e) => {
                warn!(channel = %channel_id, "Ignoring channel filter: {}", e);
                return Ok(());
            }
        };

        let mut items = self
            .catalog
            .query(&selection.catalog_filter(), selection.sort())
            .await?;
        items.retain(|item| item.is_playable());

        if items.is_empty() {
            warn!(channel = %channel_id, "No content found for channel");
            return Ok(());
        }

        if policy.shuffle {
            let mut rng = self.rng.lock().await;
            items.shuffle(&mut *rng);
        }

        info!(
            channel = %channel_id,
            "Refilled queue with {} items",
            items.len()
        );
        *queue = items.into();
        Ok(())
    }

    /// Draws up to `count` commercials from the pool below `pool`, in random
    /// order. Draws are independent: the same commercial may come back in a
    /// later call.
    pub async fn commercials(
        &self,
        pool: &Path,
        count: usize,
    ) -> Result<Vec<Arc<ContentItem>>, CatalogError> {
        if pool.as_os_str().is_empty() || count == 0 {
            return Ok(Vec::new());
        }

        let mut pool_items = self
            .catalog
            .query(&CatalogFilter::Folder(pool.to_path_buf()), None)
            .await?;
        pool_items.retain(|c| c.runtime().is_some());

        {
            let mut rng = self.rng.lock().await;
            pool_items.shuffle(&mut *rng);
        }
        pool_items.truncate(count);

        if pool_items.is_empty() {
            debug!("Commercial pool {:?} is empty", pool);
        }
        Ok(pool_items)
    }

    /// Empties a channel's queue so the next dequeue refills it.
    pub async fn clear(&self, channel_id: &str) {
        let slot = self.queues.read().await.get(channel_id).cloned();
        if let Some(slot) = slot {
            slot.lock().await.clear();
            info!(channel = %channel_id, "Cleared queue");
        }
    }

    pub async fn clear_all(&self) {
        let slots: Vec<ChannelSlot> = self.queues.read().await.values().cloned().collect();
        for slot in slots {
            slot.lock().await.clear();
        }
        info!("Cleared all channel queues");
    }

    pub async fn len(&self, channel_id: &str) -> usize {
        let slot = self.queues.read().await.get(channel_id).cloned();
        match slot {
            Some(slot) => slot.lock().await.len(),
            None => 0,
        }
    }

    /// Get-or-create the channel's slot. The map lock is never held while a
    /// channel is being refilled.
    async fn slot(&self, channel_id: &str) -> ChannelSlot {
        if let Some(slot) = self.queues.read().await.get(channel_id) {
            return Arc::clone(slot);
        }
        let mut queues = self.queues.write().await;
        Arc::clone(queues.entry(channel_id.to_string()).or_default())
    }
}
