use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vchan_core::catalog::{Catalog, CatalogFilter, LibraryCatalog, SortOrder};
use vchan_core::config::Config;
use vchan_core::{CatalogError, ContentItem, ItemKind};

pub const COMMERCIAL_FOLDER: &str = "/media/commercials";

/// Catalog whose contents can be swapped mid-test. Queries for
/// `broken_genre` fail with `CatalogError::Unavailable`, as does every
/// content query while the catalog is switched offline. Commercial pool
/// lookups are counted and can trip a cancellation token.
#[derive(Default)]
pub struct SwitchableCatalog {
    library: RwLock<LibraryCatalog>,
    broken_genre: Option<String>,
    offline: AtomicBool,
    ad_lookups: AtomicUsize,
    cancel_on_ad_lookup: Option<(usize, CancellationToken)>,
}

impl SwitchableCatalog {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self {
            library: RwLock::new(LibraryCatalog::from_items(items)),
            ..Self::default()
        }
    }

    pub fn failing_genre(mut self, genre: &str) -> Self {
        self.broken_genre = Some(genre.to_string());
        self
    }

    /// Cancels `token` during the `nth` commercial pool lookup (1-based).
    /// The lookup then yields once, so the caller sees the cancellation
    /// while the lookup is still in flight.
    pub fn cancelling_on_ad_lookup(mut self, nth: usize, token: CancellationToken) -> Self {
        self.cancel_on_ad_lookup = Some((nth, token));
        self
    }

    /// While offline, content queries fail. Commercial lookups still work.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn ad_lookups(&self) -> usize {
        self.ad_lookups.load(Ordering::SeqCst)
    }

    pub fn replace(&self, items: Vec<ContentItem>) {
        *self.library.write().unwrap() = LibraryCatalog::from_items(items);
    }

    fn snapshot(&self) -> LibraryCatalog {
        self.library.read().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for SwitchableCatalog {
    async fn query(
        &self,
        filter: &CatalogFilter,
        sort: Option<SortOrder>,
    ) -> Result<Vec<Arc<ContentItem>>, CatalogError> {
        if let CatalogFilter::Folder(_) = filter {
            let lookup = self.ad_lookups.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((nth, token)) = &self.cancel_on_ad_lookup {
                if lookup == *nth {
                    token.cancel();
                    tokio::task::yield_now().await;
                }
            }
        } else if self.offline.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("library offline".to_string()));
        }
        if let (Some(broken), CatalogFilter::Genres(genres)) = (&self.broken_genre, filter) {
            if genres.iter().any(|g| g == broken) {
                return Err(CatalogError::Unavailable(format!("{broken} shelf offline")));
            }
        }
        self.snapshot().query(filter, sort).await
    }

    async fn all_items(&self) -> Result<Vec<Arc<ContentItem>>, CatalogError> {
        self.snapshot().all_items().await
    }
}

pub fn movie(name: &str, minutes: u64) -> ContentItem {
    ContentItem::new(name, Duration::from_secs(minutes * 60))
}

pub fn movies(prefix: &str, count: usize, minutes: u64) -> Vec<ContentItem> {
    (0..count)
        .map(|i| movie(&format!("{prefix}{i}"), minutes))
        .collect()
}

pub fn genre_movies(genre: &str, count: usize, minutes: u64) -> Vec<ContentItem> {
    movies(&genre.to_lowercase(), count, minutes)
        .into_iter()
        .map(|mut item| {
            item.genres = vec![genre.to_string()];
            item
        })
        .collect()
}

/// `count` commercials of `secs` seconds each, stored under
/// [`COMMERCIAL_FOLDER`].
pub fn commercials(count: usize, secs: u64) -> Vec<ContentItem> {
    (0..count)
        .map(|i| {
            let mut ad = ContentItem::new(format!("ad{i}"), Duration::from_secs(secs));
            ad.kind = ItemKind::Commercial;
            ad.path = Some(PathBuf::from(COMMERCIAL_FOLDER).join(format!("ad{i}.mkv")));
            ad
        })
        .collect()
}

pub fn config_with_ads() -> Config {
    let mut config = Config::default();
    config.library.commercial_folder = Some(PathBuf::from(COMMERCIAL_FOLDER));
    config
}
