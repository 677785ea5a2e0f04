use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

use crate::event::{Event, MatchInfo};
use crate::{MatchId, TeamId};

pub trait EventSource {
    fn match_ids(&self) -> Vec<MatchId>;
    fn match_info(&self, id: MatchId) -> Option<MatchInfo>;
    fn events(&self, id: MatchId) -> Box<dyn Iterator<Item = Event> + '_>;
}

/// Events of one match, sorted by timestamp (ties keep their ingest order).
#[derive(Debug, Clone)]
pub struct MatchEvents {
    info: MatchInfo,
    events: Vec<Event>,
}

impl MatchEvents {
    pub fn new(info: MatchInfo, events: impl IntoIterator<Item = Event>) -> Self {
        let match_id = info.match_id;
        let mut kept = Vec::new();
        let mut foreign = 0usize;
        for ev in events {
            if ev.match_id == match_id {
                kept.push(ev);
            } else {
                foreign += 1;
            }
        }
        if foreign > 0 {
            warn!(%match_id, foreign, "dropped events carrying another match id");
        }
        kept.sort_by_key(|ev| ev.timestamp);
        Self { info, events: kept }
    }

    pub fn match_id(&self) -> MatchId {
        self.info.match_id
    }

    pub fn info(&self) -> &MatchInfo {
        &self.info
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn teams(&self) -> Vec<TeamId> {
        self.events
            .iter()
            .map(|ev| ev.team)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn opponent_of(&self, team: TeamId) -> Option<TeamId> {
        let teams = self.teams();
        match teams.as_slice() {
            [a, b] if *a == team => Some(*b),
            [a, b] if *b == team => Some(*a),
            _ => None,
        }
    }

    /// Last second covered by the data.
    pub fn end_seconds(&self) -> u32 {
        if let Some(declared) = self.info.duration_seconds {
            return declared;
        }
        let last = self.events.last().map(|ev| ev.timestamp).unwrap_or(0);
        last.max(self.info.regulation_seconds())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    matches: BTreeMap<MatchId, MatchEvents>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(infos: Vec<MatchInfo>, events: impl IntoIterator<Item = Event>) -> Self {
        let mut grouped: BTreeMap<MatchId, Vec<Event>> = BTreeMap::new();
        for ev in events {
            grouped.entry(ev.match_id).or_default().push(ev);
        }
        let mut infos: BTreeMap<MatchId, MatchInfo> =
            infos.into_iter().map(|i| (i.match_id, i)).collect();
        let mut log = Self::new();
        for (id, evs) in grouped {
            let info = infos.remove(&id).unwrap_or_else(|| MatchInfo::new(id));
            log.insert(MatchEvents::new(info, evs));
        }
        // Declared matches with no events are kept so they show up as skipped.
        for (_, info) in infos {
            log.insert(MatchEvents::new(info, Vec::new()));
        }
        log
    }

    pub fn from_source(source: &dyn EventSource) -> Self {
        let mut log = Self::new();
        for id in source.match_ids() {
            let info = source.match_info(id).unwrap_or_else(|| MatchInfo::new(id));
            log.insert(MatchEvents::new(info, source.events(id)));
        }
        log
    }

    pub fn insert(&mut self, m: MatchEvents) {
        self.matches.insert(m.match_id(), m);
    }

    pub fn get(&self, id: MatchId) -> Option<&MatchEvents> {
        self.matches.get(&id)
    }

    pub fn matches(&self) -> impl Iterator<Item = &MatchEvents> {
        self.matches.values()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.matches.values().map(|m| m.events.len()).sum()
    }
}

impl EventSource for EventLog {
    fn match_ids(&self) -> Vec<MatchId> {
        self.matches.keys().copied().collect()
    }

    fn match_info(&self, id: MatchId) -> Option<MatchInfo> {
        self.matches.get(&id).map(|m| m.info.clone())
    }

    fn events(&self, id: MatchId) -> Box<dyn Iterator<Item = Event> + '_> {
        match self.matches.get(&id) {
            Some(m) => Box::new(m.events.iter().cloned()),
            None => Box::new(std::iter::empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub lines: usize,
    pub events: usize,
    pub matches_declared: usize,
    pub malformed: usize,
}

pub fn parse_json_lines(raw: &str) -> (EventLog, LoadStats) {
    let mut stats = LoadStats::default();
    let mut infos = Vec::new();
    let mut events = Vec::new();

    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        stats.lines += 1;
        let value = match serde_json::from_str::<Value>(trimmed) {
            Ok(v) => v,
            Err(err) => {
                warn!(line = idx + 1, %err, "skipping unparseable line");
                stats.malformed += 1;
                continue;
            }
        };
        if let Some(header) = value.get("match") {
            match serde_json::from_value::<MatchInfo>(header.clone()) {
                Ok(info) => {
                    stats.matches_declared += 1;
                    infos.push(info);
                }
                Err(err) => {
                    warn!(line = idx + 1, %err, "skipping malformed match header");
                    stats.malformed += 1;
                }
            }
            continue;
        }
        match serde_json::from_value::<Event>(value) {
            Ok(ev) => {
                stats.events += 1;
                events.push(ev);
            }
            Err(err) => {
                warn!(line = idx + 1, %err, "skipping malformed event");
                stats.malformed += 1;
            }
        }
    }

    (EventLog::from_events(infos, events), stats)
}

pub fn load_json_lines(path: &Path) -> Result<(EventLog, LoadStats)> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read event log {}", path.display()))?;
    Ok(parse_json_lines(&raw))
}
