use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::event::{Event, EventCategory, EventKind};
use crate::event_log::MatchEvents;
use crate::scoring::MatchPhase;
use crate::window::{Window, WindowError, WindowExtractor};
use crate::TeamId;

pub const FEATURE_SCHEMA_VERSION: u32 = 1;

pub const WINDOW_FEATURE_NAMES: [&str; 30] = [
    "events_count",
    "events_rate",
    "opponent_events_count",
    "possession_pct",
    "attacking_count",
    "attacking_rate",
    "attacking_advantage",
    "defensive_count",
    "defensive_rate",
    "defensive_advantage",
    "disciplinary_count",
    "disciplinary_rate",
    "disciplinary_advantage",
    "administrative_count",
    "administrative_rate",
    "administrative_advantage",
    "shot_count",
    "shots_on_target",
    "shot_advantage",
    "goal_count",
    "goal_advantage",
    "pass_count",
    "pass_completion",
    "pressure_count",
    "pressure_ratio",
    "foul_count",
    "card_count",
    "sub_count",
    "activity_trend",
    "attacking_trend",
];

pub const CONTEXT_FEATURE_NAMES: [&str; 10] = [
    "minute",
    "score_diff",
    "team_goals",
    "opponent_goals",
    "phase_opening",
    "phase_normal",
    "phase_closing",
    "phase_stoppage",
    "phase_extra_time",
    "activity_trend_multi",
];

pub const RATIO_FEATURES: [&str; 3] = ["possession_pct", "pass_completion", "pressure_ratio"];

/// Schema default for a key, including suffixed per-window variants
/// such as `possession_pct_5m`.
pub fn feature_default(key: &str, neutral_ratio: f64) -> f64 {
    let is_ratio = RATIO_FEATURES
        .iter()
        .any(|r| key == *r || key.strip_prefix(r).is_some_and(|rest| rest.starts_with('_')));
    if is_ratio { neutral_ratio } else { 0.0 }
}

pub fn window_suffix(seconds: u32) -> String {
    if seconds % 60 == 0 {
        format!("{}m", seconds / 60)
    } else {
        format!("{seconds}s")
    }
}

pub fn sample_feature_names(cfg: &EngineConfig) -> Vec<String> {
    let mut names: Vec<String> = WINDOW_FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
    for lookback in distinct_lookbacks(cfg) {
        let suffix = window_suffix(lookback);
        names.extend(WINDOW_FEATURE_NAMES.iter().map(|s| format!("{s}_{suffix}")));
    }
    names.extend(CONTEXT_FEATURE_NAMES.iter().map(|s| s.to_string()));
    names.sort();
    names
}

fn distinct_lookbacks(cfg: &EngineConfig) -> Vec<u32> {
    let mut out = cfg.windows.lookback_seconds.clone();
    out.sort_unstable();
    out.dedup();
    out
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub features: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        let value = if value.is_finite() { value } else { 0.0 };
        self.features.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.features.get(key).copied()
    }

    pub fn get_or(&self, key: &str, neutral_ratio: f64) -> f64 {
        self.get(key)
            .unwrap_or_else(|| feature_default(key, neutral_ratio))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.features.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_finite(&self) -> bool {
        self.features.values().all(|v| v.is_finite())
    }

    fn extend_suffixed(&mut self, other: &FeatureVector, suffix: &str) {
        for (k, v) in other.iter() {
            self.insert(format!("{k}_{suffix}"), v);
        }
    }

    pub fn to_row(&self, names: &[String], neutral_ratio: f64) -> Vec<f64> {
        names.iter().map(|n| self.get_or(n, neutral_ratio)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    total: usize,
    by_category: [usize; 4],
    shots: usize,
    on_target: usize,
    goals: usize,
    passes: usize,
    passes_completed: usize,
    pressures: usize,
    fouls: usize,
    cards: usize,
    subs: usize,
}

impl Tally {
    fn from_events<'a>(events: impl Iterator<Item = &'a Event>) -> Self {
        let mut t = Tally::default();
        for ev in events {
            t.total += 1;
            let cat = ev.kind.category();
            if let Some(idx) = EventCategory::SCORED.iter().position(|c| *c == cat) {
                t.by_category[idx] += 1;
            }
            match &ev.kind {
                EventKind::Shot { outcome } => {
                    t.shots += 1;
                    if outcome.on_target() {
                        t.on_target += 1;
                    }
                    if ev.kind.is_goal() {
                        t.goals += 1;
                    }
                }
                EventKind::Pass { completed } => {
                    t.passes += 1;
                    if *completed {
                        t.passes_completed += 1;
                    }
                }
                EventKind::Pressure => t.pressures += 1,
                EventKind::Foul => t.fouls += 1,
                EventKind::Card { .. } => t.cards += 1,
                EventKind::Substitution => t.subs += 1,
                _ => {}
            }
        }
        t
    }

    fn attacking(&self) -> usize {
        self.by_category[0]
    }
}

fn per_minute(count: usize, span_seconds: u32) -> f64 {
    if span_seconds == 0 {
        return 0.0;
    }
    count as f64 / (span_seconds as f64 / 60.0)
}

fn ratio(num: usize, other: usize, neutral: f64) -> f64 {
    let denom = num + other;
    if denom == 0 {
        neutral
    } else {
        num as f64 / denom as f64
    }
}

#[derive(Debug, Clone)]
pub struct FeatureAggregator {
    neutral_ratio: f64,
    trend_short_seconds: u32,
    scoring_window_seconds: u32,
    lookbacks: Vec<u32>,
    extractor: WindowExtractor,
    phase: crate::config::PhaseTable,
}

impl FeatureAggregator {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            neutral_ratio: cfg.neutral_ratio,
            trend_short_seconds: cfg.windows.trend_short_seconds,
            scoring_window_seconds: cfg.windows.scoring_window_seconds,
            lookbacks: distinct_lookbacks(cfg),
            extractor: WindowExtractor::from_config(cfg),
            phase: cfg.phase.clone(),
        }
    }

    pub fn neutral_ratio(&self) -> f64 {
        self.neutral_ratio
    }

    /// Reduce one window (plus the opponent's window over the same range)
    /// to the per-window schema. A missing opponent counts as zero events.
    pub fn aggregate(&self, window: &Window<'_>, opponent: Option<&Window<'_>>) -> FeatureVector {
        let team = Tally::from_events(window.iter());
        let opp = opponent
            .map(|w| Tally::from_events(w.iter()))
            .unwrap_or_default();
        let span = window.span_seconds();
        let neutral = self.neutral_ratio;

        let mut fv = FeatureVector::new();
        fv.insert("events_count", team.total as f64);
        fv.insert("events_rate", per_minute(team.total, span));
        fv.insert("opponent_events_count", opp.total as f64);
        fv.insert("possession_pct", ratio(team.total, opp.total, neutral));

        for (idx, cat) in EventCategory::SCORED.iter().enumerate() {
            let key = cat.key();
            let own = team.by_category[idx];
            fv.insert(format!("{key}_count"), own as f64);
            fv.insert(format!("{key}_rate"), per_minute(own, span));
            fv.insert(
                format!("{key}_advantage"),
                own as f64 - opp.by_category[idx] as f64,
            );
        }

        fv.insert("shot_count", team.shots as f64);
        fv.insert("shots_on_target", team.on_target as f64);
        fv.insert("shot_advantage", team.shots as f64 - opp.shots as f64);
        fv.insert("goal_count", team.goals as f64);
        fv.insert("goal_advantage", team.goals as f64 - opp.goals as f64);
        fv.insert("pass_count", team.passes as f64);
        fv.insert(
            "pass_completion",
            ratio(
                team.passes_completed,
                team.passes - team.passes_completed,
                neutral,
            ),
        );
        fv.insert("pressure_count", team.pressures as f64);
        fv.insert("pressure_ratio", ratio(team.pressures, opp.pressures, neutral));
        fv.insert("foul_count", team.fouls as f64);
        fv.insert("card_count", team.cards as f64);
        fv.insert("sub_count", team.subs as f64);

        let (activity_trend, attacking_trend) = self.trend(window, &team);
        fv.insert("activity_trend", activity_trend);
        fv.insert("attacking_trend", attacking_trend);
        fv
    }

    // Rate over the trailing short span minus rate over the whole window.
    fn trend(&self, window: &Window<'_>, whole: &Tally) -> (f64, f64) {
        let span = window.span_seconds();
        let short = self.trend_short_seconds;
        if short == 0 || span <= short {
            return (0.0, 0.0);
        }
        let tail = Tally::from_events(window.since(window.end - short));
        (
            per_minute(tail.total, short) - per_minute(whole.total, span),
            per_minute(tail.attacking(), short) - per_minute(whole.attacking(), span),
        )
    }

    pub fn aggregate_current(
        &self,
        m: &MatchEvents,
        entity: TeamId,
        opponent: TeamId,
        reference_time: u32,
    ) -> Result<FeatureVector, WindowError> {
        let (team_w, opp_w) = self.extractor.extract_pair(
            m,
            entity,
            opponent,
            reference_time,
            self.scoring_window_seconds,
        )?;
        let mut fv = self.aggregate(&team_w, Some(&opp_w));

        let mut rates = Vec::with_capacity(self.lookbacks.len());
        for lookback in &self.lookbacks {
            let (team_w, opp_w) =
                self.extractor
                    .extract_pair(m, entity, opponent, reference_time, *lookback)?;
            let per_window = self.aggregate(&team_w, Some(&opp_w));
            rates.push(per_window.get_or("events_rate", self.neutral_ratio));
            fv.extend_suffixed(&per_window, &window_suffix(*lookback));
        }
        // Lookbacks are sorted, so first is shortest and last is longest.
        let multi = match (rates.first(), rates.last()) {
            (Some(short), Some(long)) if rates.len() > 1 => short - long,
            _ => 0.0,
        };
        fv.insert("activity_trend_multi", multi);

        let state = MatchState::as_of(m, entity, opponent, reference_time);
        let phase = MatchPhase::at(reference_time, m.info().regulation_minutes, &self.phase);
        fv.insert("minute", reference_time as f64 / 60.0);
        fv.insert("score_diff", state.score_diff() as f64);
        fv.insert("team_goals", state.team_goals as f64);
        fv.insert("opponent_goals", state.opponent_goals as f64);
        for p in MatchPhase::ALL {
            fv.insert(p.flag_key(), if p == phase { 1.0 } else { 0.0 });
        }
        Ok(fv)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchState {
    pub team_goals: u32,
    pub opponent_goals: u32,
}

impl MatchState {
    pub fn as_of(m: &MatchEvents, entity: TeamId, opponent: TeamId, t: u32) -> Self {
        let all = m.events();
        let hi = all.partition_point(|ev| ev.timestamp < t);
        let mut state = MatchState::default();
        for ev in &all[..hi] {
            if !ev.kind.is_goal() {
                continue;
            }
            if ev.team == entity {
                state.team_goals += 1;
            } else if ev.team == opponent {
                state.opponent_goals += 1;
            }
        }
        state
    }

    pub fn score_diff(&self) -> i32 {
        self.team_goals as i32 - self.opponent_goals as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{MatchInfo, ShotOutcome};
    use crate::MatchId;

    const M: MatchId = MatchId(9);
    const HOME: TeamId = TeamId(1);
    const AWAY: TeamId = TeamId(2);

    fn shot(team: TeamId, ts: u32, outcome: ShotOutcome) -> Event {
        Event::new(M, team, ts, EventKind::Shot { outcome })
    }

    fn aggregator() -> FeatureAggregator {
        FeatureAggregator::from_config(&EngineConfig::default())
    }

    #[test]
    fn empty_window_yields_baseline() {
        let m = MatchEvents::new(MatchInfo::new(M), Vec::new());
        let x = WindowExtractor::new(0);
        let (a, b) = x.extract_pair(&m, HOME, AWAY, 600, 180).unwrap();
        let fv = aggregator().aggregate(&a, Some(&b));
        assert_eq!(fv.len(), WINDOW_FEATURE_NAMES.len());
        for name in WINDOW_FEATURE_NAMES {
            let expected = if RATIO_FEATURES.contains(&name) { 0.5 } else { 0.0 };
            assert_eq!(fv.get(name), Some(expected), "{name}");
        }
    }

    #[test]
    fn counts_rates_and_advantages() {
        let events = vec![
            shot(HOME, 10, ShotOutcome::Goal),
            shot(HOME, 20, ShotOutcome::OffTarget),
            Event::new(M, HOME, 30, EventKind::Pressure),
            Event::new(M, AWAY, 40, EventKind::Pressure),
            Event::new(M, AWAY, 50, EventKind::Pressure),
            Event::new(M, AWAY, 55, EventKind::Pass { completed: true }),
        ];
        let m = MatchEvents::new(MatchInfo::new(M), events);
        let x = WindowExtractor::new(0);
        let (a, b) = x.extract_pair(&m, HOME, AWAY, 120, 120).unwrap();
        let fv = aggregator().aggregate(&a, Some(&b));
        assert_eq!(fv.get("events_count"), Some(3.0));
        assert_eq!(fv.get("events_rate"), Some(1.5));
        assert_eq!(fv.get("shot_count"), Some(2.0));
        assert_eq!(fv.get("shots_on_target"), Some(1.0));
        assert_eq!(fv.get("goal_advantage"), Some(1.0));
        assert_eq!(fv.get("attacking_advantage"), Some(2.0));
        assert_eq!(fv.get("defensive_advantage"), Some(-1.0));
        assert_eq!(fv.get("possession_pct"), Some(0.5));
        assert!((fv.get("pressure_ratio").unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(fv.get("pass_completion"), Some(0.5));
    }

    #[test]
    fn trend_compares_tail_to_whole_window() {
        // 6 events in the last minute of a 3 minute window, none before.
        let events = (0..6)
            .map(|i| Event::new(M, HOME, 300 + i * 10, EventKind::Carry))
            .collect::<Vec<_>>();
        let m = MatchEvents::new(MatchInfo::new(M), events);
        let x = WindowExtractor::new(0);
        let w = x.extract(&m, HOME, 360, 180).unwrap();
        let fv = aggregator().aggregate(&w, None);
        assert_eq!(fv.get("events_rate"), Some(2.0));
        assert_eq!(fv.get("activity_trend"), Some(4.0));
        assert_eq!(fv.get("attacking_trend"), Some(4.0));
    }

    #[test]
    fn ratio_defaults_cover_suffixed_keys() {
        let fv = FeatureVector::new();
        assert_eq!(fv.get_or("pressure_ratio_5m", 0.5), 0.5);
        assert_eq!(fv.get_or("possession_pct", 0.4), 0.4);
        assert_eq!(fv.get_or("possession_pctx", 0.4), 0.0);
        assert_eq!(fv.get_or("shot_count_10m", 0.4), 0.0);
    }

    #[test]
    fn current_features_match_schema() {
        let cfg = EngineConfig::default();
        let events = vec![
            shot(HOME, 100, ShotOutcome::Goal),
            Event::new(M, AWAY, 200, EventKind::Carry),
            Event::new(M, HOME, 650, EventKind::Carry),
        ];
        let m = MatchEvents::new(MatchInfo::new(M), events);
        let fv = FeatureAggregator::from_config(&cfg)
            .aggregate_current(&m, HOME, AWAY, 700)
            .unwrap();
        let mut keys: Vec<String> = fv.features.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, sample_feature_names(&cfg));
        assert_eq!(fv.get("score_diff"), Some(1.0));
        assert_eq!(fv.get("phase_opening"), Some(1.0));
        assert_eq!(fv.get("phase_normal"), Some(0.0));
        assert_eq!(fv.get("events_count_10m"), Some(2.0));
        assert_eq!(fv.get("events_count_2m"), Some(1.0));
        assert!(fv.is_finite());
    }

    #[test]
    fn non_finite_values_are_zeroed_on_insert() {
        let mut fv = FeatureVector::new();
        fv.insert("events_rate", f64::INFINITY);
        assert_eq!(fv.get("events_rate"), Some(0.0));
    }

    #[test]
    fn match_state_counts_goals_before_cutoff() {
        let events = vec![
            shot(HOME, 100, ShotOutcome::Goal),
            shot(AWAY, 200, ShotOutcome::Goal),
            shot(AWAY, 300, ShotOutcome::Goal),
            shot(HOME, 400, ShotOutcome::Saved),
        ];
        let m = MatchEvents::new(MatchInfo::new(M), events);
        let s = MatchState::as_of(&m, HOME, AWAY, 300);
        assert_eq!(s, MatchState { team_goals: 1, opponent_goals: 1 });
        let s = MatchState::as_of(&m, AWAY, HOME, 301);
        assert_eq!(s.score_diff(), 1);
    }
}
