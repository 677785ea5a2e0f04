use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::event::{CardColor, CompetitionStage, Event, EventKind, MatchInfo, ShotOutcome};
use crate::event_log::{EventSource, MatchEvents};
use crate::{MatchId, TeamId};

#[derive(Debug, Clone)]
pub struct SyntheticMatch {
    pub match_id: MatchId,
    pub home: TeamId,
    pub away: TeamId,
    pub stage: CompetitionStage,
    pub regulation_minutes: u32,
    pub intensity: f64,
}

impl SyntheticMatch {
    pub fn new(match_id: MatchId) -> Self {
        let base = (match_id.0 as u32).wrapping_mul(2);
        Self {
            match_id,
            home: TeamId(base.wrapping_add(1)),
            away: TeamId(base.wrapping_add(2)),
            stage: CompetitionStage::League,
            regulation_minutes: 90,
            intensity: 12.0,
        }
    }

    pub fn with_stage(mut self, stage: CompetitionStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn generate(&self, seed: u64) -> MatchEvents {
        let mut rng = StdRng::seed_from_u64(seed ^ self.match_id.0.rotate_left(17));
        let stoppage = rng.gen_range(1..=6u32);
        let minutes = self.regulation_minutes + stoppage;

        // Home share of play drifts minute to minute, which produces swings.
        let mut home_share: f64 = rng.gen_range(0.4..0.6);
        let mut events = Vec::new();
        for minute in 0..minutes {
            home_share = (home_share + rng.gen_range(-0.08..0.08)).clamp(0.2, 0.8);
            let lo = (self.intensity * 0.5).max(1.0) as u32;
            let hi = (self.intensity * 1.5).max(2.0) as u32;
            let count = rng.gen_range(lo..=hi);
            for _ in 0..count {
                let team = if rng.gen_bool(home_share) {
                    self.home
                } else {
                    self.away
                };
                let ts = minute * 60 + rng.gen_range(0..60);
                let kind = random_kind(&mut rng);
                let mut ev = Event::new(self.match_id, team, ts, kind);
                ev.under_pressure = rng.gen_bool(0.2);
                events.push(ev);
            }
        }

        let mut info = MatchInfo::new(self.match_id).with_stage(self.stage);
        info.regulation_minutes = self.regulation_minutes;
        info.duration_seconds = Some(minutes * 60);
        MatchEvents::new(info, events)
    }
}

fn random_kind(rng: &mut StdRng) -> EventKind {
    match rng.gen_range(0..100u32) {
        0..=39 => EventKind::Pass {
            completed: rng.gen_bool(0.8),
        },
        40..=47 => EventKind::Carry,
        48..=51 => EventKind::Dribble {
            completed: rng.gen_bool(0.5),
        },
        52..=54 => EventKind::Shot {
            outcome: match rng.gen_range(0..10u32) {
                0 => ShotOutcome::Goal,
                1..=3 => ShotOutcome::Saved,
                4..=6 => ShotOutcome::OffTarget,
                7..=8 => ShotOutcome::Blocked,
                _ => ShotOutcome::Post,
            },
        },
        55..=69 => EventKind::Pressure,
        70..=74 => EventKind::Tackle,
        75..=77 => EventKind::Interception,
        78..=80 => EventKind::Clearance,
        81..=87 => EventKind::BallRecovery,
        88..=89 => EventKind::Block,
        90..=93 => EventKind::Foul,
        94 => EventKind::Card {
            card: if rng.gen_bool(0.9) {
                CardColor::Yellow
            } else {
                CardColor::Red
            },
        },
        95 => EventKind::Substitution,
        96 => EventKind::TacticalShift,
        _ => EventKind::Other {
            label: "throw_in".to_string(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    pub matches: usize,
    pub seed: u64,
}

impl SyntheticFeed {
    pub fn new(matches: usize, seed: u64) -> Self {
        Self { matches, seed }
    }

    fn match_for(&self, id: MatchId) -> SyntheticMatch {
        let stage = match id.0 % 8 {
            6 => CompetitionStage::Knockout,
            7 => CompetitionStage::Final,
            0..=2 => CompetitionStage::Group,
            _ => CompetitionStage::League,
        };
        SyntheticMatch::new(id).with_stage(stage)
    }

    fn contains(&self, id: MatchId) -> bool {
        id.0 >= 1 && id.0 <= self.matches as u64
    }
}

impl EventSource for SyntheticFeed {
    fn match_ids(&self) -> Vec<MatchId> {
        (1..=self.matches as u64).map(MatchId).collect()
    }

    fn match_info(&self, id: MatchId) -> Option<MatchInfo> {
        self.contains(id)
            .then(|| self.match_for(id).generate(self.seed).info().clone())
    }

    fn events(&self, id: MatchId) -> Box<dyn Iterator<Item = Event> + '_> {
        if !self.contains(id) {
            return Box::new(std::iter::empty());
        }
        let m = self.match_for(id).generate(self.seed);
        Box::new(m.events().to_vec().into_iter())
    }
}
