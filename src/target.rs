use serde::{Deserialize, Serialize};

use crate::event_log::MatchEvents;
use crate::scoring::{MomentumScore, Scorer};
use crate::window::WindowError;
use crate::TeamId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendLabel::Increasing => "increasing",
            TrendLabel::Decreasing => "decreasing",
            TrendLabel::Stable => "stable",
        }
    }
}

/// Changes strictly beyond `±threshold` are a trend.
pub fn classify_trend(change: f64, threshold: f64) -> TrendLabel {
    if change > threshold {
        TrendLabel::Increasing
    } else if change < -threshold {
        TrendLabel::Decreasing
    } else {
        TrendLabel::Stable
    }
}

/// Momentum over `[reference_time, reference_time + horizon)`, scored the
/// same way as current momentum. `None` when the horizon runs past the end
/// of the match data.
pub fn future_target(
    m: &MatchEvents,
    entity: TeamId,
    opponent: TeamId,
    reference_time: u32,
    horizon_seconds: u32,
    scorer: &Scorer,
) -> Result<Option<MomentumScore>, WindowError> {
    if horizon_seconds == 0 {
        return Err(WindowError::ZeroHorizon);
    }
    if reference_time.saturating_add(horizon_seconds) > m.end_seconds() {
        return Ok(None);
    }
    let (team, opp) =
        scorer
            .extractor()
            .extract_future_pair(m, entity, opponent, reference_time, horizon_seconds)?;
    Ok(Some(scorer.score_window(m, &team, &opp)))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetLabel {
    pub future: MomentumScore,
    pub momentum_change: f64,
    pub trend: TrendLabel,
}

impl TargetLabel {
    pub fn new(current: &MomentumScore, future: MomentumScore, threshold: f64) -> Self {
        let momentum_change = future.value - current.value;
        Self {
            trend: classify_trend(momentum_change, threshold),
            momentum_change,
            future,
        }
    }
}
