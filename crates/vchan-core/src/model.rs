use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// ── Content ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    Movie,
    Episode,
    Commercial,
}

/// One playable entry of the content library. Read-only to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub name: String,
    /// Total runtime, `None` when the library never probed it.
    #[serde(default, with = "opt_secs")]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub kind: ItemKind,
    #[serde(default)]
    pub series_id: Option<Uuid>,
    /// Season number (the parent index in library terms).
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ContentItem {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            path: Some(PathBuf::from(format!("/media/{name}.mkv"))),
            name,
            duration: Some(duration),
            overview: None,
            kind: ItemKind::Movie,
            series_id: None,
            season: None,
            episode: None,
            genres: Vec::new(),
            year: None,
            tags: Vec::new(),
        }
    }

    /// Runtime, only when known and strictly positive.
    pub fn runtime(&self) -> Option<Duration> {
        self.duration.filter(|d| !d.is_zero())
    }

    /// Resolvable media path and a positive runtime.
    pub fn is_playable(&self) -> bool {
        let has_path = self
            .path
            .as_ref()
            .map(|p| !p.as_os_str().is_empty())
            .unwrap_or(false);
        has_path && self.runtime().is_some()
    }
}

// ── Schedule ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Content,
    Commercial,
    PreRoll,
    PostRoll,
}

impl SegmentKind {
    pub fn is_advert(&self) -> bool {
        !matches!(self, SegmentKind::Content)
    }
}

/// One atomic slice of a program's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledSegment {
    pub kind: SegmentKind,
    pub item: Arc<ContentItem>,
    /// Where playback starts inside `item`; zero unless this is a split chunk.
    #[serde(with = "secs")]
    pub start_offset: Duration,
    #[serde(with = "secs")]
    pub duration: Duration,
}

impl ScheduledSegment {
    pub fn content(item: Arc<ContentItem>, start_offset: Duration, duration: Duration) -> Self {
        Self {
            kind: SegmentKind::Content,
            item,
            start_offset,
            duration,
        }
    }

    pub fn advert(kind: SegmentKind, item: Arc<ContentItem>, duration: Duration) -> Self {
        Self {
            kind,
            item,
            start_offset: Duration::ZERO,
            duration,
        }
    }
}

/// One occupant of a channel's timeline.
///
/// `end - start` always equals the sum of the segment durations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledProgram {
    pub id: String,
    pub item: Arc<ContentItem>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub channel_id: String,
    pub segments: Vec<ScheduledSegment>,
}

impl ScheduledProgram {
    /// Lays `segments` out from `start`. Returns `None` if the end time
    /// falls off the calendar.
    pub fn new(
        channel_id: impl Into<String>,
        item: Arc<ContentItem>,
        start: DateTime<Utc>,
        segments: Vec<ScheduledSegment>,
    ) -> Option<Self> {
        let total = total_duration(&segments);
        let end = start.checked_add_signed(TimeDelta::from_std(total).ok()?)?;
        Some(Self {
            id: Uuid::new_v4().to_string(),
            item,
            start,
            end,
            channel_id: channel_id.into(),
            segments,
        })
    }

    pub fn duration(&self) -> Duration {
        total_duration(&self.segments)
    }

    /// Half-open containment: `[start, end)`.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }

    pub fn elapsed_at(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.start
    }
}

pub fn total_duration(segments: &[ScheduledSegment]) -> Duration {
    segments.iter().map(|s| s.duration).sum()
}

// ── Serde helpers: durations as fractional seconds ───────────────────────────

pub(crate) mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(d)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mins(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn playable_requires_path_and_runtime() {
        let mut item = ContentItem::new("Heat", mins(170));
        assert!(item.is_playable());

        item.duration = Some(Duration::ZERO);
        assert!(!item.is_playable());

        item.duration = Some(mins(1));
        item.path = None;
        assert!(!item.is_playable());
    }

    #[test]
    fn program_end_matches_segment_sum() {
        let item = Arc::new(ContentItem::new("Alien", mins(117)));
        let start = Utc::now();
        let segments = vec![
            ScheduledSegment::content(item.clone(), Duration::ZERO, mins(60)),
            ScheduledSegment::content(item.clone(), mins(60), mins(57)),
        ];
        let program = ScheduledProgram::new("virtual_1", item, start, segments).unwrap();

        assert_eq!(program.duration(), mins(117));
        assert_eq!((program.end - program.start).num_minutes(), 117);
        assert!(program.contains(start));
        assert!(!program.contains(program.end));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let item = Arc::new(ContentItem::new("Ad", Duration::from_secs(30)));
        let segment = ScheduledSegment::advert(SegmentKind::Commercial, item, Duration::from_secs(30));
        let json = serde_json::to_value(&segment).unwrap();
        assert_eq!(json["duration"], 30.0);
        assert_eq!(json["kind"], "commercial");
    }
}
