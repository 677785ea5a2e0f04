use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, EngineConfig, PhaseTable, SituationalTable};
use crate::event::CompetitionStage;
use crate::event_log::MatchEvents;
use crate::features::{FeatureAggregator, FeatureVector, MatchState};
use crate::window::{Window, WindowError, WindowExtractor};
use crate::{MatchId, TeamId};

pub const MAX_MOMENTUM: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Shots,
    Attacking,
    Possession,
    PressureBalance,
    Disciplinary,
    RecentActivity,
    ActivityTrend,
    GoalAdvantage,
}

impl Component {
    pub const ALL: [Component; 8] = [
        Component::Shots,
        Component::Attacking,
        Component::Possession,
        Component::PressureBalance,
        Component::Disciplinary,
        Component::RecentActivity,
        Component::ActivityTrend,
        Component::GoalAdvantage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Component::Shots => "shots",
            Component::Attacking => "attacking",
            Component::Possession => "possession",
            Component::PressureBalance => "pressure_balance",
            Component::Disciplinary => "disciplinary",
            Component::RecentActivity => "recent_activity",
            Component::ActivityTrend => "activity_trend",
            Component::GoalAdvantage => "goal_advantage",
        }
    }

    pub fn feature(self) -> &'static str {
        match self {
            Component::Shots => "shot_count",
            Component::Attacking => "attacking_rate",
            Component::Possession => "possession_pct",
            Component::PressureBalance => "pressure_ratio",
            Component::Disciplinary => "disciplinary_advantage",
            Component::RecentActivity => "events_rate",
            Component::ActivityTrend => "activity_trend",
            Component::GoalAdvantage => "goal_advantage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Opening,
    Normal,
    Closing,
    Stoppage,
    ExtraTime,
}

impl MatchPhase {
    pub const ALL: [MatchPhase; 5] = [
        MatchPhase::Opening,
        MatchPhase::Normal,
        MatchPhase::Closing,
        MatchPhase::Stoppage,
        MatchPhase::ExtraTime,
    ];

    pub fn at(seconds: u32, regulation_minutes: u32, table: &PhaseTable) -> Self {
        let minute = seconds / 60;
        if minute >= regulation_minutes + table.stoppage_allowance_minutes {
            MatchPhase::ExtraTime
        } else if minute >= regulation_minutes {
            MatchPhase::Stoppage
        } else if minute < table.opening_end_minute {
            MatchPhase::Opening
        } else if minute >= regulation_minutes.saturating_sub(table.closing_window_minutes) {
            MatchPhase::Closing
        } else {
            MatchPhase::Normal
        }
    }

    pub fn multiplier(self, table: &PhaseTable) -> f64 {
        match self {
            MatchPhase::Opening => table.opening,
            MatchPhase::Normal => table.normal,
            MatchPhase::Closing => table.closing,
            MatchPhase::Stoppage => table.stoppage,
            MatchPhase::ExtraTime => table.extra_time,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchPhase::Opening => "opening",
            MatchPhase::Normal => "normal",
            MatchPhase::Closing => "closing",
            MatchPhase::Stoppage => "stoppage",
            MatchPhase::ExtraTime => "extra_time",
        }
    }

    pub fn flag_key(self) -> &'static str {
        match self {
            MatchPhase::Opening => "phase_opening",
            MatchPhase::Normal => "phase_normal",
            MatchPhase::Closing => "phase_closing",
            MatchPhase::Stoppage => "phase_stoppage",
            MatchPhase::ExtraTime => "phase_extra_time",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SituationalContext {
    pub score_diff: Option<i32>,
    pub stage: Option<CompetitionStage>,
}

impl SituationalContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_state(state: MatchState, stage: CompetitionStage) -> Self {
        Self {
            score_diff: Some(state.score_diff()),
            stage: Some(stage),
        }
    }

    pub fn multiplier(&self, table: &SituationalTable) -> f64 {
        let by_score = match self.score_diff {
            None => 1.0,
            Some(d) if d <= -2 => table.trailing_two_plus,
            Some(-1) => table.trailing_one,
            Some(0) => table.level,
            Some(1) => table.leading_one,
            Some(_) => table.leading_two_plus,
        };
        let by_stage = match self.stage {
            None => 1.0,
            Some(CompetitionStage::Group) => table.group,
            Some(CompetitionStage::League) => table.league,
            Some(CompetitionStage::Knockout) => table.knockout,
            Some(CompetitionStage::Final) => table.final_stage,
        };
        by_score * by_stage
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreParts {
    pub value: f64,
    pub raw: f64,
    pub phase_multiplier: f64,
    pub situational_multiplier: f64,
    pub components: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumScore {
    pub match_id: MatchId,
    pub entity: TeamId,
    pub reference_time: u32,
    pub value: f64,
    pub raw: f64,
    pub phase: MatchPhase,
    pub phase_multiplier: f64,
    pub situational_multiplier: f64,
    pub component_breakdown: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreKey {
    pub match_id: MatchId,
    pub entity: TeamId,
    pub reference_time: u32,
}

#[derive(Debug, Clone)]
pub struct Scorer {
    cfg: EngineConfig,
    aggregator: FeatureAggregator,
    extractor: WindowExtractor,
}

impl Scorer {
    pub fn new(cfg: &EngineConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            cfg: cfg.clone(),
            aggregator: FeatureAggregator::from_config(cfg),
            extractor: WindowExtractor::from_config(cfg),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn aggregator(&self) -> &FeatureAggregator {
        &self.aggregator
    }

    pub fn extractor(&self) -> &WindowExtractor {
        &self.extractor
    }

    pub fn score_vector(
        &self,
        features: &FeatureVector,
        phase: MatchPhase,
        situational: &SituationalContext,
    ) -> ScoreParts {
        let neutral = self.cfg.neutral_ratio;
        let mut components = BTreeMap::new();
        let mut raw = 0.0;
        for component in Component::ALL {
            let contribution =
                self.cfg.weights.weight(component) * features.get_or(component.feature(), neutral);
            raw += contribution;
            components.insert(component.name().to_string(), contribution);
        }
        let phase_multiplier = phase.multiplier(&self.cfg.phase);
        let situational_multiplier = situational.multiplier(&self.cfg.situational);
        let scaled = raw * phase_multiplier * situational_multiplier;
        let value = if scaled.is_finite() {
            scaled.clamp(0.0, MAX_MOMENTUM)
        } else {
            0.0
        };
        ScoreParts {
            value,
            raw,
            phase_multiplier,
            situational_multiplier,
            components,
        }
    }

    pub fn score(
        &self,
        key: ScoreKey,
        features: &FeatureVector,
        phase: MatchPhase,
        situational: &SituationalContext,
    ) -> MomentumScore {
        let parts = self.score_vector(features, phase, situational);
        MomentumScore {
            match_id: key.match_id,
            entity: key.entity,
            reference_time: key.reference_time,
            value: parts.value,
            raw: parts.raw,
            phase,
            phase_multiplier: parts.phase_multiplier,
            situational_multiplier: parts.situational_multiplier,
            component_breakdown: parts.components,
        }
    }

    /// Score a team window against the opponent's window over the same
    /// range. Phase and score state are taken as of the window end.
    pub fn score_window(
        &self,
        m: &MatchEvents,
        team: &Window<'_>,
        opponent: &Window<'_>,
    ) -> MomentumScore {
        let features = self.aggregator.aggregate(team, Some(opponent));
        let as_of = team.end;
        let phase = MatchPhase::at(as_of, m.info().regulation_minutes, &self.cfg.phase);
        let state = MatchState::as_of(m, team.entity, opponent.entity, as_of);
        let situational = SituationalContext::from_state(state, m.info().stage);
        let key = ScoreKey {
            match_id: team.match_id,
            entity: team.entity,
            reference_time: team.reference_time,
        };
        self.score(key, &features, phase, &situational)
    }

    pub fn current_momentum(
        &self,
        m: &MatchEvents,
        entity: TeamId,
        opponent: TeamId,
        reference_time: u32,
    ) -> Result<MomentumScore, WindowError> {
        let (team, opp) = self.extractor.extract_pair(
            m,
            entity,
            opponent,
            reference_time,
            self.cfg.windows.scoring_window_seconds,
        )?;
        Ok(self.score_window(m, &team, &opp))
    }
}
