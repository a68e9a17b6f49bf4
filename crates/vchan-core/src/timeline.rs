//! Offset lookup inside an assembled program, for viewers joining mid-way.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use crate::model::{ScheduledProgram, ScheduledSegment};

/// Where a given elapsed offset lands inside a segment list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position<'a> {
    pub index: usize,
    pub segment: &'a ScheduledSegment,
    /// Offset from the start of `segment`.
    pub offset: Duration,
}

impl Position<'_> {
    /// Offset inside the segment's media file, i.e. what to seek the
    /// transcoder to.
    pub fn media_offset(&self) -> Duration {
        self.segment.start_offset + self.offset
    }
}

/// The segment whose span `[start, start + duration)` contains `elapsed`.
///
/// `None` for negative offsets and for offsets at or past the end.
pub fn locate(segments: &[ScheduledSegment], elapsed: TimeDelta) -> Option<Position<'_>> {
    let elapsed = elapsed.to_std().ok()?;

    let mut running = Duration::ZERO;
    for (index, segment) in segments.iter().enumerate() {
        let end = running + segment.duration;
        if elapsed < end {
            return Some(Position {
                index,
                segment,
                offset: elapsed - running,
            });
        }
        running = end;
    }
    None
}

/// [`locate`] against wall-clock time for a program already on air.
pub fn locate_at(program: &ScheduledProgram, now: DateTime<Utc>) -> Option<Position<'_>> {
    locate(&program.segments, program.elapsed_at(now))
}
