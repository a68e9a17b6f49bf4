use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::debug;

use crate::model::ScheduledProgram;

/// Append-only record of what a channel has been committed to broadcast.
///
/// Guide queries and tune-ins read from here; the content queue is only
/// consumed when the timeline has to grow past its horizon. Programs are
/// contiguous: each starts exactly where the previous one ends.
#[derive(Debug, Default)]
pub struct CommittedTimeline {
    programs: VecDeque<ScheduledProgram>,
}

impl CommittedTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Start of the oldest retained program.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.programs.front().map(|p| p.start)
    }

    /// End of the last committed program.
    pub fn horizon(&self) -> Option<DateTime<Utc>> {
        self.programs.back().map(|p| p.end)
    }

    /// Where extension has to continue from to cover a window starting at
    /// `window_start`, as seen at wall-clock time `now`.
    ///
    /// While the horizon has not passed `now` the timeline is live and
    /// extension continues from the horizon, filling any gap up to a future
    /// window. A horizon before `now` means the channel sat idle: the
    /// timeline is dropped and the channel restarts at the earlier of
    /// `window_start` and `now`.
    pub fn resume_point(
        &mut self,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let restart = window_start.min(now);
        match self.horizon() {
            Some(horizon) if horizon >= now || horizon >= window_start => horizon,
            Some(horizon) => {
                debug!("Dropping stale timeline ending at {}", horizon);
                self.programs.clear();
                restart
            }
            None => restart,
        }
    }

    /// Appends freshly built programs. They must continue from the horizon.
    pub fn extend(&mut self, programs: impl IntoIterator<Item = ScheduledProgram>) {
        for program in programs {
            debug_assert!(
                self.horizon().map_or(true, |h| h == program.start),
                "committed programs must be contiguous"
            );
            self.programs.push_back(program);
        }
    }

    /// Programs overlapping `[start, end)`, in broadcast order.
    pub fn window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<ScheduledProgram> {
        self.programs
            .iter()
            .filter(|p| p.overlaps(start, end))
            .cloned()
            .collect()
    }

    pub fn program_at(&self, at: DateTime<Utc>) -> Option<&ScheduledProgram> {
        self.programs.iter().find(|p| p.contains(at))
    }

    /// Forgets programs that finished at or before `cutoff`.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut pruned = 0;
        while self.programs.front().is_some_and(|p| p.end <= cutoff) {
            self.programs.pop_front();
            pruned += 1;
        }
        pruned
    }

    pub fn clear(&mut self) {
        self.programs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentItem, ScheduledSegment};
    use chrono::TimeDelta;
    use std::sync::Arc;
    use std::time::Duration;

    fn program_at(start: DateTime<Utc>, mins: u64) -> ScheduledProgram {
        let item = Arc::new(ContentItem::new("p", Duration::from_secs(mins * 60)));
        let segment = ScheduledSegment::content(item.clone(), Duration::ZERO, Duration::from_secs(mins * 60));
        ScheduledProgram::new("virtual_1", item, start, vec![segment]).unwrap()
    }

    fn timeline(start: DateTime<Utc>, lengths: &[u64]) -> CommittedTimeline {
        let mut timeline = CommittedTimeline::new();
        let mut cursor = start;
        for mins in lengths {
            let program = program_at(cursor, *mins);
            cursor = program.end;
            timeline.extend([program]);
        }
        timeline
    }

    #[test]
    fn test_window_and_lookup() {
        let t0 = Utc::now();
        let tl = timeline(t0, &[30, 60, 45]);
        assert_eq!(tl.horizon(), Some(t0 + TimeDelta::minutes(135)));

        let hits = tl.window(t0 + TimeDelta::minutes(40), t0 + TimeDelta::minutes(95));
        assert_eq!(hits.len(), 2);

        let on_air = tl.program_at(t0 + TimeDelta::minutes(30)).unwrap();
        assert_eq!(on_air.start, t0 + TimeDelta::minutes(30));
        assert!(tl.program_at(t0 + TimeDelta::minutes(135)).is_none());
    }

    #[test]
    fn test_prune_and_resume() {
        let t0 = Utc::now();
        let mut tl = timeline(t0, &[30, 30, 30]);

        assert_eq!(tl.prune_before(t0 + TimeDelta::minutes(45)), 1);
        assert_eq!(tl.start(), Some(t0 + TimeDelta::minutes(30)));

        let horizon = tl.horizon().unwrap();
        assert_eq!(tl.resume_point(t0, t0), horizon);

        let idle = horizon + TimeDelta::hours(2);
        assert_eq!(tl.resume_point(idle, idle), idle);
        assert!(tl.is_empty());
    }

    #[test]
    fn test_future_window_keeps_live_timeline() {
        let t0 = Utc::now();
        let mut tl = timeline(t0, &[30, 30]);
        let horizon = tl.horizon().unwrap();

        let tomorrow = t0 + TimeDelta::days(1);
        assert_eq!(tl.resume_point(tomorrow, t0 + TimeDelta::minutes(5)), horizon);
        assert_eq!(tl.len(), 2);
        assert!(tl.program_at(t0 + TimeDelta::minutes(5)).is_some());
    }

    #[test]
    fn test_empty_timeline_starts_no_later_than_now() {
        let t0 = Utc::now();
        let mut tl = CommittedTimeline::new();
        assert_eq!(tl.resume_point(t0 + TimeDelta::hours(3), t0), t0);
        assert_eq!(tl.resume_point(t0 - TimeDelta::hours(3), t0), t0 - TimeDelta::hours(3));
    }
}
