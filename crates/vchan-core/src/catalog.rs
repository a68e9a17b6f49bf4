//! Content library contract and a TOML-file backed implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::model::{ContentItem, ItemKind};

/// What to select from the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogFilter {
    /// Every movie and episode.
    All,
    /// Movies and episodes carrying any of these genres.
    Genres(Vec<String>),
    /// Movies produced within the inclusive year range.
    Years { start: i32, end: i32 },
    /// Episodes whose series ancestor is this id.
    Series(Uuid),
    /// Movies and episodes carrying any of these tags.
    Tags(Vec<String>),
    /// Anything stored below this path (the commercial pool).
    Folder(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Season ascending, then episode ascending.
    SeasonEpisode,
}

/// Queryable content library.
///
/// Implementations only return playable items: a resolvable path and a
/// positive known runtime.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn query(
        &self,
        filter: &CatalogFilter,
        sort: Option<SortOrder>,
    ) -> Result<Vec<Arc<ContentItem>>, CatalogError>;

    /// Every item in the library, playable or not.
    async fn all_items(&self) -> Result<Vec<Arc<ContentItem>>, CatalogError>;
}

/// In-memory library, usually loaded from a `[[item]]` TOML file.
#[derive(Debug, Clone, Default)]
pub struct LibraryCatalog {
    items: Vec<Arc<ContentItem>>,
}

impl LibraryCatalog {
    pub fn from_items(items: impl IntoIterator<Item = ContentItem>) -> Self {
        Self {
            items: items.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_items(parse_library_toml_str(&content)?);
        info!("Loaded {} library items from {:?}", catalog.len(), path);
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl Catalog for LibraryCatalog {
    async fn query(
        &self,
        filter: &CatalogFilter,
        sort: Option<SortOrder>,
    ) -> Result<Vec<Arc<ContentItem>>, CatalogError> {
        let mut items: Vec<_> = self
            .items
            .iter()
            .filter(|item| item.is_playable() && matches_filter(item, filter))
            .cloned()
            .collect();

        if let Some(SortOrder::SeasonEpisode) = sort {
            items.sort_by_key(|item| (item.season.unwrap_or(0), item.episode.unwrap_or(0)));
        }

        Ok(items)
    }

    async fn all_items(&self) -> Result<Vec<Arc<ContentItem>>, CatalogError> {
        Ok(self.items.clone())
    }
}

fn matches_filter(item: &ContentItem, filter: &CatalogFilter) -> bool {
    let programme = matches!(item.kind, ItemKind::Movie | ItemKind::Episode);
    match filter {
        CatalogFilter::All => programme,
        CatalogFilter::Genres(genres) => programme && any_caseless(&item.genres, genres),
        CatalogFilter::Years { start, end } => {
            item.kind == ItemKind::Movie
                && item.year.map(|y| (*start..=*end).contains(&y)).unwrap_or(false)
        }
        CatalogFilter::Series(series_id) => {
            item.kind == ItemKind::Episode && item.series_id == Some(*series_id)
        }
        CatalogFilter::Tags(tags) => programme && any_caseless(&item.tags, tags),
        CatalogFilter::Folder(folder) => item
            .path
            .as_ref()
            .map(|p| p.starts_with(folder))
            .unwrap_or(false),
    }
}

fn any_caseless(have: &[String], want: &[String]) -> bool {
    have.iter()
        .any(|h| want.iter().any(|w| h.eq_ignore_ascii_case(w.trim())))
}

// ── TOML library loader ───────────────────────────────────────────────────────

/// Matches the TOML `[[item]]` table. Kept apart from `ContentItem` so the
/// file schema can stay friendly (`runtime_secs`) without touching the model.
#[derive(Debug, serde::Deserialize)]
struct TomlLibraryFile {
    #[serde(default)]
    item: Vec<TomlItem>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlItem {
    id: Uuid,
    name: String,
    #[serde(default)]
    runtime_secs: Option<f64>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    kind: ItemKind,
    #[serde(default)]
    series_id: Option<Uuid>,
    #[serde(default)]
    season: Option<u32>,
    #[serde(default)]
    episode: Option<u32>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    tags: Vec<String>,
}

pub fn parse_library_toml_str(content: &str) -> Result<Vec<ContentItem>, CatalogError> {
    let file: TomlLibraryFile = toml::from_str(content)?;
    let items = file
        .item
        .into_iter()
        .map(|i| ContentItem {
            id: i.id,
            name: i.name,
            // Negative or NaN runtimes count as unknown
            duration: i.runtime_secs.and_then(|s| Duration::try_from_secs_f64(s).ok()),
            path: i.path,
            overview: i.overview,
            kind: i.kind,
            series_id: i.series_id,
            season: i.season,
            episode: i.episode,
            genres: i.genres,
            year: i.year,
            tags: i.tags,
        })
        .collect();
    Ok(items)
}
