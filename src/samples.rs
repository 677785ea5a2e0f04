use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::event_log::{EventLog, MatchEvents};
use crate::features::FeatureVector;
use crate::progress::{BuildProgress, NoopObserver, ProgressObserver};
use crate::scoring::{MomentumScore, Scorer};
use crate::target::{TargetLabel, TrendLabel, future_target};
use crate::window::WindowError;
use crate::{MatchId, TeamId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub match_id: MatchId,
    pub entity: TeamId,
    pub opponent: TeamId,
    pub reference_time: u32,
    pub current_features: FeatureVector,
    pub current_momentum: MomentumScore,
    pub future_momentum: MomentumScore,
    pub momentum_change: f64,
    pub trend_label: TrendLabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoEvents,
    TeamCount(usize),
    Window(String),
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoEvents => write!(f, "no events"),
            SkipReason::TeamCount(n) => write!(f, "expected 2 teams, found {n}"),
            SkipReason::Window(err) => write!(f, "window error: {err}"),
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<WindowError> for SkipReason {
    fn from(err: WindowError) -> Self {
        SkipReason::Window(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMatch {
    pub match_id: MatchId,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// Sorted by `(match_id, entity, reference_time)`.
    pub samples: Vec<Sample>,
    pub skipped: Vec<SkippedMatch>,
    pub matches_seen: usize,
    /// Candidate points with no team events in the shortest look-back.
    pub samples_without_signal: usize,
    /// Candidate points whose horizon runs past the end of the data.
    pub samples_without_label: usize,
}

impl BuildReport {
    pub fn matches_with_samples(&self) -> usize {
        let mut ids: Vec<MatchId> = self.samples.iter().map(|s| s.match_id).collect();
        ids.dedup();
        ids.len()
    }
}

#[derive(Debug, Default)]
struct MatchOutcome {
    samples: Vec<Sample>,
    without_signal: usize,
    without_label: usize,
}

pub struct SampleBuilder<'a> {
    scorer: &'a Scorer,
    observer: &'a dyn ProgressObserver,
    stop: Option<&'a AtomicBool>,
}

impl<'a> SampleBuilder<'a> {
    pub fn new(scorer: &'a Scorer) -> Self {
        Self {
            scorer,
            observer: &NoopObserver,
            stop: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Matches not yet started when the flag is set are reported as cancelled.
    pub fn with_stop_flag(mut self, stop: &'a AtomicBool) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn reference_times(&self, m: &MatchEvents) -> Vec<u32> {
        let w = &self.scorer.config().windows;
        let step = w.sampling_step_seconds.max(1);
        let first = w.shortest_lookback().div_ceil(step).max(1) * step;
        let end = m.end_seconds();
        (first..=end).step_by(step as usize).collect()
    }

    pub fn build(&self, log: &EventLog) -> BuildReport {
        let matches: Vec<&MatchEvents> = log.matches().collect();
        let total = matches.len();
        let threads = self.scorer.config().threads;

        let outcomes: Vec<(MatchId, Result<MatchOutcome, SkipReason>)> = with_build_pool(threads, || {
            matches
                .par_iter()
                .enumerate()
                .map(|(index, m)| {
                    let match_id = m.match_id();
                    if self.stop.is_some_and(|s| s.load(Ordering::Relaxed)) {
                        return (match_id, Err(SkipReason::Cancelled));
                    }
                    self.observer.on_progress(BuildProgress::MatchStarted {
                        match_id,
                        index,
                        total,
                    });
                    let outcome = self.build_match(m);
                    match &outcome {
                        Ok(out) => self.observer.on_progress(BuildProgress::MatchFinished {
                            match_id,
                            samples: out.samples.len(),
                        }),
                        Err(reason) => self.observer.on_progress(BuildProgress::MatchSkipped {
                            match_id,
                            reason: reason.to_string(),
                        }),
                    }
                    (match_id, outcome)
                })
                .collect()
        });

        let mut report = BuildReport {
            matches_seen: total,
            ..BuildReport::default()
        };
        for (match_id, outcome) in outcomes {
            match outcome {
                Ok(out) => {
                    report.samples_without_signal += out.without_signal;
                    report.samples_without_label += out.without_label;
                    report.samples.extend(out.samples);
                }
                Err(reason) => {
                    if reason != SkipReason::Cancelled {
                        warn!(%match_id, %reason, "skipping match");
                    }
                    report.skipped.push(SkippedMatch { match_id, reason });
                }
            }
        }
        report
            .samples
            .sort_by_key(|s| (s.match_id, s.entity, s.reference_time));
        report.skipped.sort_by_key(|s| s.match_id);

        info!(
            matches = report.matches_seen,
            samples = report.samples.len(),
            skipped = report.skipped.len(),
            without_signal = report.samples_without_signal,
            without_label = report.samples_without_label,
            "built samples"
        );
        self.observer.on_progress(BuildProgress::Finished {
            matches: report.matches_seen,
            samples: report.samples.len(),
            skipped: report.skipped.len(),
        });
        report
    }

    fn build_match(&self, m: &MatchEvents) -> Result<MatchOutcome, SkipReason> {
        if m.is_empty() {
            return Err(SkipReason::NoEvents);
        }
        let teams = m.teams();
        if teams.len() != 2 {
            return Err(SkipReason::TeamCount(teams.len()));
        }

        let cfg = self.scorer.config();
        let shortest = cfg.windows.shortest_lookback();
        let horizon = cfg.windows.horizon_seconds;
        let extractor = self.scorer.extractor();
        let times = self.reference_times(m);
        let mut out = MatchOutcome::default();

        for (entity, opponent) in [(teams[0], teams[1]), (teams[1], teams[0])] {
            for &t in &times {
                if extractor.extract(m, entity, t, shortest)?.is_empty() {
                    debug!(match_id = %m.match_id(), %entity, t, "no recent events");
                    out.without_signal += 1;
                    continue;
                }
                let Some(future) = future_target(m, entity, opponent, t, horizon, self.scorer)?
                else {
                    debug!(match_id = %m.match_id(), %entity, t, "horizon past end of data");
                    out.without_label += 1;
                    continue;
                };
                let current = self.scorer.current_momentum(m, entity, opponent, t)?;
                let current_features =
                    self.scorer
                        .aggregator()
                        .aggregate_current(m, entity, opponent, t)?;
                let label = TargetLabel::new(&current, future, cfg.trend.threshold);
                out.samples.push(Sample {
                    match_id: m.match_id(),
                    entity,
                    opponent,
                    reference_time: t,
                    current_features,
                    current_momentum: current,
                    future_momentum: label.future,
                    momentum_change: label.momentum_change,
                    trend_label: label.trend,
                });
            }
        }
        Ok(out)
    }
}

pub fn build_samples(
    log: &EventLog,
    step_seconds: u32,
    lookbacks: &[u32],
    horizon_seconds: u32,
    cfg: &EngineConfig,
) -> Result<BuildReport, ConfigError> {
    let mut cfg = cfg.clone();
    cfg.windows.sampling_step_seconds = step_seconds;
    cfg.windows.lookback_seconds = lookbacks.to_vec();
    cfg.windows.horizon_seconds = horizon_seconds;
    let scorer = Scorer::new(&cfg)?;
    Ok(SampleBuilder::new(&scorer).build(log))
}

fn with_build_pool<T>(threads: Option<usize>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    let Some(threads) = threads else {
        return action();
    };
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}
