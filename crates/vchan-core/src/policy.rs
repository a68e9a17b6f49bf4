use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::catalog::{CatalogFilter, SortOrder};
use crate::error::FilterError;

/// How a channel picks its content. Stored in the config as `kind = "..."`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Genre,
    Year,
    Series,
    /// Tag based selection.
    #[default]
    Custom,
    All,
}

impl ChannelKind {
    /// Kinds that automatic channel generation owns and may replace.
    pub fn is_generated(&self) -> bool {
        matches!(self, ChannelKind::Genre | ChannelKind::Year)
    }
}

/// Configuration of one virtual channel, the `[[channel]]` TOML table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPolicy {
    pub name: String,
    pub number: u32,
    #[serde(default)]
    pub kind: ChannelKind,
    /// Genres, a year spec, a series id or tags depending on `kind`.
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub shuffle: bool,
    /// Only meaningful for series channels.
    #[serde(default = "default_true")]
    pub respect_episode_order: bool,
    #[serde(default = "default_commercial_interval")]
    pub commercial_interval_secs: u64,
    #[serde(default = "default_true")]
    pub pre_rolls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_commercial_interval() -> u64 {
    900
}

impl ChannelPolicy {
    pub fn new(name: impl Into<String>, number: u32, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            number,
            kind,
            filters: Vec::new(),
            shuffle: false,
            respect_episode_order: true,
            commercial_interval_secs: default_commercial_interval(),
            pre_rolls: true,
            logo: None,
            enabled: true,
        }
    }

    pub fn with_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Stable identifier used as the key for queues, timelines and state.
    pub fn channel_id(&self) -> String {
        format!("virtual_{}", self.number)
    }

    pub fn commercial_interval(&self) -> Duration {
        Duration::from_secs(self.commercial_interval_secs)
    }

    /// Typed view of `kind` + `filters`.
    pub fn selection_filter(&self) -> Result<SelectionFilter, FilterError> {
        let first = self.filters.iter().map(|f| f.trim()).find(|f| !f.is_empty());

        match self.kind {
            ChannelKind::Genre if self.filters.is_empty() => Ok(SelectionFilter::Unrestricted),
            ChannelKind::Genre => Ok(SelectionFilter::Genres(self.filters.clone())),
            ChannelKind::Year => {
                let spec = first.ok_or(FilterError::Missing(self.kind))?;
                let (start, end) = parse_year_range(spec)?;
                Ok(SelectionFilter::Years { start, end })
            }
            ChannelKind::Series => {
                let raw = first.ok_or(FilterError::Missing(self.kind))?;
                let series_id = Uuid::parse_str(raw)
                    .map_err(|_| FilterError::InvalidSeriesId(raw.to_string()))?;
                Ok(SelectionFilter::Series {
                    series_id,
                    natural_order: self.respect_episode_order,
                })
            }
            ChannelKind::Custom if self.filters.is_empty() => Ok(SelectionFilter::Unrestricted),
            ChannelKind::Custom => Ok(SelectionFilter::Tags(self.filters.clone())),
            ChannelKind::All => Ok(SelectionFilter::Unrestricted),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionFilter {
    Genres(Vec<String>),
    /// Inclusive on both ends.
    Years {
        start: i32,
        end: i32,
    },
    Series {
        series_id: Uuid,
        natural_order: bool,
    },
    Tags(Vec<String>),
    Unrestricted,
}

impl SelectionFilter {
    pub fn catalog_filter(&self) -> CatalogFilter {
        match self {
            SelectionFilter::Genres(genres) => CatalogFilter::Genres(genres.clone()),
            SelectionFilter::Years { start, end } => CatalogFilter::Years {
                start: *start,
                end: *end,
            },
            SelectionFilter::Series { series_id, .. } => CatalogFilter::Series(*series_id),
            SelectionFilter::Tags(tags) => CatalogFilter::Tags(tags.clone()),
            SelectionFilter::Unrestricted => CatalogFilter::All,
        }
    }

    pub fn sort(&self) -> Option<SortOrder> {
        match self {
            SelectionFilter::Series {
                natural_order: true,
                ..
            } => Some(SortOrder::SeasonEpisode),
            _ => None,
        }
    }
}

/// Accepts a single year (`1994`), a decade (`1990s`) or an inclusive range
/// (`1990-1995`).
pub fn parse_year_range(spec: &str) -> Result<(i32, i32), FilterError> {
    let invalid = || FilterError::InvalidYear(spec.to_string());
    let spec = spec.trim();

    if let Some(decade) = spec.strip_suffix('s') {
        let start: i32 = decade.parse().map_err(|_| invalid())?;
        if start % 10 != 0 {
            return Err(invalid());
        }
        return Ok((start, start + 9));
    }

    if let Some((from, to)) = spec.split_once('-') {
        let start: i32 = from.trim().parse().map_err(|_| invalid())?;
        let end: i32 = to.trim().parse().map_err(|_| invalid())?;
        if end < start {
            return Err(invalid());
        }
        return Ok((start, end));
    }

    let year: i32 = spec.parse().map_err(|_| invalid())?;
    Ok((year, year))
}
