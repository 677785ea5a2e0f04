use thiserror::Error;

use crate::config::EngineConfig;
use crate::event::Event;
use crate::event_log::MatchEvents;
use crate::{MatchId, TeamId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("look-back must be positive")]
    ZeroLookback,

    #[error("horizon must be positive")]
    ZeroHorizon,

    #[error("reference time {reference_time}s outside match bounds 0..={limit}s")]
    OutOfBounds { reference_time: u32, limit: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDirection {
    Current,
    Future,
}

/// One entity's events inside a half-open time range `[start, end)`.
#[derive(Debug, Clone)]
pub struct Window<'a> {
    pub match_id: MatchId,
    pub entity: TeamId,
    pub reference_time: u32,
    pub start: u32,
    pub end: u32,
    pub direction: WindowDirection,
    pub events: Vec<&'a Event>,
}

impl<'a> Window<'a> {
    pub fn span_seconds(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn span_minutes(&self) -> f64 {
        self.span_seconds() as f64 / 60.0
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn since(&self, t: u32) -> impl Iterator<Item = &'a Event> + '_ {
        let idx = self.events.partition_point(|ev| ev.timestamp < t);
        self.events[idx..].iter().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Event> + '_ {
        self.events.iter().copied()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowExtractor {
    extra_time_allowance: u32,
}

impl WindowExtractor {
    pub fn new(extra_time_allowance_seconds: u32) -> Self {
        Self {
            extra_time_allowance: extra_time_allowance_seconds,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.extra_time_allowance_seconds)
    }

    fn check_reference(&self, m: &MatchEvents, reference_time: u32) -> Result<(), WindowError> {
        let limit = m.end_seconds().saturating_add(self.extra_time_allowance);
        if reference_time > limit {
            return Err(WindowError::OutOfBounds {
                reference_time,
                limit,
            });
        }
        Ok(())
    }

    pub fn extract<'a>(
        &self,
        m: &'a MatchEvents,
        entity: TeamId,
        reference_time: u32,
        lookback_seconds: u32,
    ) -> Result<Window<'a>, WindowError> {
        if lookback_seconds == 0 {
            return Err(WindowError::ZeroLookback);
        }
        self.check_reference(m, reference_time)?;
        let start = reference_time.saturating_sub(lookback_seconds);
        Ok(slice(m, entity, reference_time, start, reference_time, WindowDirection::Current))
    }

    pub fn extract_pair<'a>(
        &self,
        m: &'a MatchEvents,
        entity: TeamId,
        opponent: TeamId,
        reference_time: u32,
        lookback_seconds: u32,
    ) -> Result<(Window<'a>, Window<'a>), WindowError> {
        Ok((
            self.extract(m, entity, reference_time, lookback_seconds)?,
            self.extract(m, opponent, reference_time, lookback_seconds)?,
        ))
    }

    pub fn extract_future<'a>(
        &self,
        m: &'a MatchEvents,
        entity: TeamId,
        reference_time: u32,
        horizon_seconds: u32,
    ) -> Result<Window<'a>, WindowError> {
        if horizon_seconds == 0 {
            return Err(WindowError::ZeroHorizon);
        }
        self.check_reference(m, reference_time)?;
        let end = reference_time.saturating_add(horizon_seconds);
        Ok(slice(m, entity, reference_time, reference_time, end, WindowDirection::Future))
    }

    pub fn extract_future_pair<'a>(
        &self,
        m: &'a MatchEvents,
        entity: TeamId,
        opponent: TeamId,
        reference_time: u32,
        horizon_seconds: u32,
    ) -> Result<(Window<'a>, Window<'a>), WindowError> {
        Ok((
            self.extract_future(m, entity, reference_time, horizon_seconds)?,
            self.extract_future(m, opponent, reference_time, horizon_seconds)?,
        ))
    }
}

fn slice<'a>(
    m: &'a MatchEvents,
    entity: TeamId,
    reference_time: u32,
    start: u32,
    end: u32,
    direction: WindowDirection,
) -> Window<'a> {
    let all = m.events();
    let lo = all.partition_point(|ev| ev.timestamp < start);
    let hi = all.partition_point(|ev| ev.timestamp < end);
    let events = all[lo..hi.max(lo)]
        .iter()
        .filter(|ev| ev.team == entity)
        .collect();
    Window {
        match_id: m.match_id(),
        entity,
        reference_time,
        start,
        end,
        direction,
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, MatchInfo};

    fn fixture() -> MatchEvents {
        let id = MatchId(1);
        let events = [0u32, 59, 60, 119, 120, 121, 300]
            .into_iter()
            .enumerate()
            .map(|(i, ts)| {
                let team = if i % 2 == 0 { TeamId(1) } else { TeamId(2) };
                Event::new(id, team, ts, EventKind::Pressure)
            })
            .collect::<Vec<_>>();
        MatchEvents::new(MatchInfo::new(id), events)
    }

    #[test]
    fn current_window_excludes_reference_second() {
        let m = fixture();
        let x = WindowExtractor::new(0);
        let w = x.extract(&m, TeamId(1), 120, 60).unwrap();
        let ts: Vec<u32> = w.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![60]);
        assert_eq!(w.start, 60);
        assert_eq!(w.direction, WindowDirection::Current);
    }

    #[test]
    fn future_window_includes_reference_second() {
        let m = fixture();
        let x = WindowExtractor::new(0);
        let w = x.extract_future(&m, TeamId(1), 120, 60).unwrap();
        let ts: Vec<u32> = w.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![120]);
        assert_eq!(w.end, 180);
    }

    #[test]
    fn lookback_before_kickoff_clamps() {
        let m = fixture();
        let x = WindowExtractor::new(0);
        let w = x.extract(&m, TeamId(2), 30, 600).unwrap();
        assert_eq!(w.start, 0);
        assert!(w.is_empty());
        assert_eq!(w.span_seconds(), 30);
    }

    #[test]
    fn invalid_arguments_are_errors() {
        let m = fixture();
        let x = WindowExtractor::new(60);
        assert_eq!(x.extract(&m, TeamId(1), 10, 0).unwrap_err(), WindowError::ZeroLookback);
        assert_eq!(
            x.extract_future(&m, TeamId(1), 10, 0).unwrap_err(),
            WindowError::ZeroHorizon
        );
        assert!(matches!(
            x.extract(&m, TeamId(1), 5400 + 61, 60),
            Err(WindowError::OutOfBounds { limit: 5460, .. })
        ));
    }

    #[test]
    fn trailing_slice_starts_at_cutoff() {
        let m = fixture();
        let x = WindowExtractor::new(0);
        let w = x.extract(&m, TeamId(2), 301, 301).unwrap();
        let tail: Vec<u32> = w.since(100).map(|e| e.timestamp).collect();
        assert_eq!(tail, vec![119, 121]);
    }
}
