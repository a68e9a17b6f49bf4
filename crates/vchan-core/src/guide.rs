//! Program guide data model.
//!
//! Carries everything a guide renderer (XMLTV or otherwise) needs for one
//! channel listing and one programme entry.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{ItemKind, ScheduledProgram};
use crate::policy::ChannelPolicy;

/// At most this many genres are listed as categories.
pub const MAX_CATEGORIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuideChannel {
    pub id: String,
    pub number: u32,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl From<&ChannelPolicy> for GuideChannel {
    fn from(policy: &ChannelPolicy) -> Self {
        Self {
            id: policy.channel_id(),
            number: policy.number,
            display_name: policy.name.clone(),
            icon: policy.logo.clone().filter(|l| !l.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeNumber {
    /// `S01E02`
    pub onscreen: String,
    /// Zero-based `season.episode.` form, e.g. `0.1.`
    pub xmltv_ns: String,
}

impl EpisodeNumber {
    pub fn new(season: u32, episode: u32) -> Self {
        Self {
            onscreen: format!("S{:02}E{:02}", season, episode),
            xmltv_ns: format!(
                "{}.{}.",
                season.saturating_sub(1),
                episode.saturating_sub(1)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuideEntry {
    pub program_id: String,
    pub channel: String,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<EpisodeNumber>,
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl From<&ScheduledProgram> for GuideEntry {
    fn from(program: &ScheduledProgram) -> Self {
        let item = &program.item;
        let title = if item.name.trim().is_empty() {
            "Unknown".to_string()
        } else {
            item.name.clone()
        };

        let episode = match (item.kind, item.season, item.episode) {
            (ItemKind::Episode, Some(season), Some(episode)) => {
                Some(EpisodeNumber::new(season, episode))
            }
            _ => None,
        };

        Self {
            program_id: program.id.clone(),
            channel: program.channel_id.clone(),
            start: program.start,
            stop: program.end,
            title,
            description: item.overview.clone().filter(|o| !o.is_empty()),
            episode,
            categories: item.genres.iter().take(MAX_CATEGORIES).cloned().collect(),
            year: item.year,
        }
    }
}
