//! Genre and decade channels derived from what the library actually holds.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::AutoChannelConfig;
use crate::error::CatalogError;
use crate::model::{ContentItem, ItemKind};
use crate::policy::{ChannelKind, ChannelPolicy};

/// Builds the automatic channel line-up. Genre channels come first, in
/// alphabetical order, then decade channels newest first. Numbers are handed
/// out consecutively from `settings.base_channel_number`.
pub async fn generate_auto_channels(
    catalog: &dyn Catalog,
    settings: &AutoChannelConfig,
) -> Result<Vec<ChannelPolicy>, CatalogError> {
    if !settings.enabled {
        return Ok(Vec::new());
    }

    let items = catalog.all_items().await?;
    let mut channels = Vec::new();
    let mut number = settings.base_channel_number;

    if settings.genres {
        let counts = genre_counts(items.iter().map(|i| i.as_ref()));
        info!("Found {} genres for auto-channel generation", counts.len());
        for (genre, count) in counts {
            if count < settings.min_genre_items {
                continue;
            }
            channels.push(auto_policy(
                format!("{genre} Channel"),
                number,
                ChannelKind::Genre,
                genre,
            ));
            number += 1;
        }
    }

    if settings.decades {
        let counts = decade_counts(items.iter().map(|i| i.as_ref()));
        info!("Found {} decades for auto-channel generation", counts.len());
        for (decade, count) in counts.into_iter().rev() {
            if count < settings.min_decade_items {
                continue;
            }
            channels.push(auto_policy(
                format!("{decade}s Movies"),
                number,
                ChannelKind::Year,
                format!("{decade}s"),
            ));
            number += 1;
        }
    }

    info!("Auto-generated {} channels", channels.len());
    Ok(channels)
}

/// Drops previously generated genre and year channels from `configured` and
/// appends `generated` in their place.
///
/// Generated channels keep their order but move up to the next free number
/// when a kept channel already uses theirs.
pub fn merge_auto_channels(
    configured: &[ChannelPolicy],
    generated: Vec<ChannelPolicy>,
) -> Vec<ChannelPolicy> {
    let mut merged: Vec<ChannelPolicy> = configured
        .iter()
        .filter(|p| !p.kind.is_generated())
        .cloned()
        .collect();
    let mut taken: HashSet<u32> = merged.iter().map(|p| p.number).collect();

    let mut floor = 0;
    for mut policy in generated {
        let mut number = policy.number.max(floor);
        while taken.contains(&number) {
            number = number.saturating_add(1);
        }
        if number != policy.number {
            debug!(
                "Channel {} moved from number {} to {}",
                policy.name, policy.number, number
            );
            policy.number = number;
        }
        taken.insert(number);
        floor = number.saturating_add(1);
        merged.push(policy);
    }
    merged
}

/// Every distinct genre in the library, sorted.
pub async fn library_genres(catalog: &dyn Catalog) -> Result<Vec<String>, CatalogError> {
    let genres: BTreeSet<String> = catalog
        .all_items()
        .await?
        .iter()
        .flat_map(|item| item.genres.iter())
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect();
    Ok(genres.into_iter().collect())
}

fn auto_policy(name: String, number: u32, kind: ChannelKind, filter: String) -> ChannelPolicy {
    let mut policy = ChannelPolicy::new(name, number, kind).with_filters([filter]);
    policy.shuffle = true;
    policy.respect_episode_order = false;
    policy
}

fn genre_counts<'a>(items: impl Iterator<Item = &'a ContentItem>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for item in items.filter(|i| matches!(i.kind, ItemKind::Movie | ItemKind::Episode)) {
        let distinct: BTreeSet<&str> = item
            .genres
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .collect();
        for genre in distinct {
            *counts.entry(genre.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

fn decade_counts<'a>(items: impl Iterator<Item = &'a ContentItem>) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for year in items
        .filter(|i| i.kind == ItemKind::Movie)
        .filter_map(|i| i.year)
    {
        *counts.entry(year.div_euclid(10) * 10).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LibraryCatalog;
    use crate::policy::SelectionFilter;
    use std::time::Duration;

    fn movie(name: &str, genres: &[&str], year: i32) -> ContentItem {
        let mut item = ContentItem::new(name, Duration::from_secs(5400));
        item.genres = genres.iter().map(|g| g.to_string()).collect();
        item.year = Some(year);
        item
    }

    fn library() -> LibraryCatalog {
        let mut items = Vec::new();
        for i in 0..6 {
            items.push(movie(&format!("horror{i}"), &["Horror"], 1985 + i));
        }
        for i in 0..5 {
            items.push(movie(&format!("drama{i}"), &["Drama", "Romance"], 1994 + i));
        }
        items.push(movie("lonely", &["Western"], 1960));
        LibraryCatalog::from_items(items)
    }

    #[tokio::test]
    async fn test_genre_channels_need_enough_items() {
        let settings = AutoChannelConfig::default();
        let channels = generate_auto_channels(&library(), &settings).await.unwrap();

        let names: Vec<_> = channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Drama Channel", "Horror Channel", "Romance Channel"]);
        assert_eq!(channels[0].number, 1000);
        assert_eq!(channels[2].number, 1002);
        assert!(channels.iter().all(|c| c.shuffle && c.pre_rolls));
        assert_eq!(channels[0].commercial_interval_secs, 900);
    }

    #[tokio::test]
    async fn test_decade_channels_newest_first() {
        let settings = AutoChannelConfig {
            genres: false,
            decades: true,
            min_decade_items: 5,
            base_channel_number: 2000,
            ..AutoChannelConfig::default()
        };
        let channels = generate_auto_channels(&library(), &settings).await.unwrap();

        let names: Vec<_> = channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["1990s Movies", "1980s Movies"]);
        assert_eq!(
            channels[1].selection_filter().unwrap(),
            SelectionFilter::Years { start: 1980, end: 1989 }
        );
        assert_eq!(channels[0].number, 2000);
    }

    #[tokio::test]
    async fn test_disabled_generates_nothing() {
        let settings = AutoChannelConfig {
            enabled: false,
            ..AutoChannelConfig::default()
        };
        assert!(generate_auto_channels(&library(), &settings).await.unwrap().is_empty());
    }

    #[test]
    fn test_merge_replaces_generated_kinds() {
        let configured = vec![
            ChannelPolicy::new("Mine", 5, ChannelKind::Custom),
            ChannelPolicy::new("Old Horror", 1000, ChannelKind::Genre),
            ChannelPolicy::new("Old 80s", 1001, ChannelKind::Year),
        ];
        let generated = vec![ChannelPolicy::new("Drama Channel", 1000, ChannelKind::Genre)];

        let merged = merge_auto_channels(&configured, generated);
        let names: Vec<_> = merged.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Mine", "Drama Channel"]);
    }

    #[test]
    fn test_merge_skips_numbers_in_use() {
        let configured = vec![
            ChannelPolicy::new("Mine", 1000, ChannelKind::Custom),
            ChannelPolicy::new("Late", 1002, ChannelKind::Series),
        ];
        let generated = vec![
            ChannelPolicy::new("Drama Channel", 1000, ChannelKind::Genre),
            ChannelPolicy::new("Horror Channel", 1001, ChannelKind::Genre),
            ChannelPolicy::new("Western Channel", 1002, ChannelKind::Genre),
        ];

        let merged = merge_auto_channels(&configured, generated);
        let numbers: Vec<_> = merged.iter().map(|c| (c.name.as_str(), c.number)).collect();
        assert_eq!(
            numbers,
            [
                ("Mine", 1000),
                ("Late", 1002),
                ("Drama Channel", 1001),
                ("Horror Channel", 1003),
                ("Western Channel", 1004),
            ]
        );
    }

    #[tokio::test]
    async fn test_library_genres_sorted_distinct() {
        let genres = library_genres(&library()).await.unwrap();
        assert_eq!(genres, ["Drama", "Horror", "Romance", "Western"]);
    }
}
