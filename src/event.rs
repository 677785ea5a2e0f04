use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MatchId, TeamId};

pub const EVENT_TAXONOMY_VERSION: u32 = 1;

pub const DEFAULT_REGULATION_MINUTES: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotOutcome {
    Goal,
    Saved,
    OffTarget,
    Blocked,
    Post,
}

impl ShotOutcome {
    pub fn on_target(self) -> bool {
        matches!(self, ShotOutcome::Goal | ShotOutcome::Saved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardColor {
    Yellow,
    SecondYellow,
    Red,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Pass { completed: bool },
    Shot { outcome: ShotOutcome },
    Carry,
    Dribble { completed: bool },
    Pressure,
    Tackle,
    Block,
    Interception,
    Clearance,
    BallRecovery,
    Foul,
    Card { card: CardColor },
    Substitution,
    TacticalShift,
    Other { label: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Attacking,
    Defensive,
    Disciplinary,
    Administrative,
    Distribution,
    Other,
}

impl EventCategory {
    pub const SCORED: [EventCategory; 4] = [
        EventCategory::Attacking,
        EventCategory::Defensive,
        EventCategory::Disciplinary,
        EventCategory::Administrative,
    ];

    pub fn key(self) -> &'static str {
        match self {
            EventCategory::Attacking => "attacking",
            EventCategory::Defensive => "defensive",
            EventCategory::Disciplinary => "disciplinary",
            EventCategory::Administrative => "administrative",
            EventCategory::Distribution => "distribution",
            EventCategory::Other => "other",
        }
    }
}

impl EventKind {
    pub fn category(&self) -> EventCategory {
        match self {
            EventKind::Shot { .. } | EventKind::Carry | EventKind::Dribble { .. } => {
                EventCategory::Attacking
            }
            EventKind::Pressure
            | EventKind::Tackle
            | EventKind::Block
            | EventKind::Interception
            | EventKind::Clearance
            | EventKind::BallRecovery => EventCategory::Defensive,
            EventKind::Foul | EventKind::Card { .. } => EventCategory::Disciplinary,
            EventKind::Substitution | EventKind::TacticalShift => EventCategory::Administrative,
            EventKind::Pass { .. } => EventCategory::Distribution,
            EventKind::Other { .. } => EventCategory::Other,
        }
    }

    pub fn is_goal(&self) -> bool {
        matches!(
            self,
            EventKind::Shot {
                outcome: ShotOutcome::Goal
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Match-relative seconds on a continuous clock (stoppage and extra time
    /// run on past the regulation mark).
    pub timestamp: u32,
    pub match_id: MatchId,
    pub team: TeamId,
    #[serde(flatten)]
    pub kind: EventKind,
    #[serde(default)]
    pub under_pressure: bool,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Event {
    pub fn new(match_id: MatchId, team: TeamId, timestamp: u32, kind: EventKind) -> Self {
        Self {
            timestamp,
            match_id,
            team,
            kind,
            under_pressure: false,
            location: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn at_minute(
        match_id: MatchId,
        team: TeamId,
        minute: u32,
        second: u32,
        kind: EventKind,
    ) -> Self {
        Self::new(match_id, team, minute * 60 + second.min(59), kind)
    }

    pub fn minute(&self) -> u32 {
        self.timestamp / 60
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStage {
    Group,
    #[default]
    League,
    Knockout,
    Final,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub match_id: MatchId,
    #[serde(default)]
    pub stage: CompetitionStage,
    #[serde(default = "default_regulation_minutes")]
    pub regulation_minutes: u32,
    // Declared end of data; when absent the last event (or regulation) bounds it.
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub kickoff: Option<DateTime<Utc>>,
}

fn default_regulation_minutes() -> u32 {
    DEFAULT_REGULATION_MINUTES
}

impl MatchInfo {
    pub fn new(match_id: MatchId) -> Self {
        Self {
            match_id,
            stage: CompetitionStage::default(),
            regulation_minutes: default_regulation_minutes(),
            duration_seconds: None,
            kickoff: None,
        }
    }

    pub fn with_stage(mut self, stage: CompetitionStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn regulation_seconds(&self) -> u32 {
        self.regulation_minutes * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(
            EventKind::Shot {
                outcome: ShotOutcome::Saved
            }
            .category(),
            EventCategory::Attacking
        );
        assert_eq!(EventKind::Interception.category(), EventCategory::Defensive);
        assert_eq!(
            EventKind::Card {
                card: CardColor::Yellow
            }
            .category(),
            EventCategory::Disciplinary
        );
        assert_eq!(EventKind::TacticalShift.category(), EventCategory::Administrative);
        assert_eq!(
            EventKind::Pass { completed: true }.category(),
            EventCategory::Distribution
        );
    }

    #[test]
    fn event_json_uses_flat_type_tag() {
        let raw = r#"{"timestamp":125,"match_id":7,"team":3,"type":"shot","outcome":"goal"}"#;
        let ev: Event = serde_json::from_str(raw).expect("event should parse");
        assert_eq!(ev.timestamp, 125);
        assert_eq!(ev.match_id, MatchId(7));
        assert!(ev.kind.is_goal());
        assert!(!ev.under_pressure);
        assert_eq!(ev.minute(), 2);
    }

    #[test]
    fn minute_and_second_map_to_clock() {
        let ev = Event::at_minute(MatchId(7), TeamId(3), 45, 30, EventKind::Carry);
        assert_eq!(ev.timestamp, 2730);
        assert_eq!(ev.minute(), 45);
        let late = Event::at_minute(MatchId(7), TeamId(3), 90, 75, EventKind::Carry);
        assert_eq!(late.timestamp, 5459);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let raw = r#"{"timestamp":1,"match_id":7,"team":3,"type":"shoot"}"#;
        assert!(serde_json::from_str::<Event>(raw).is_err());
    }

    #[test]
    fn match_info_defaults_to_regulation_ninety() {
        let info: MatchInfo = serde_json::from_str(r#"{"match_id":1}"#).unwrap();
        assert_eq!(info.regulation_seconds(), 5400);
        assert_eq!(info.stage, CompetitionStage::League);
    }
}
