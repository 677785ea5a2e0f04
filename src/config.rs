use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::event::DEFAULT_REGULATION_MINUTES;
use crate::scoring::Component;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unsupported config version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("weight for component `{component}` must be finite, got {value}")]
    NonFiniteWeight { component: &'static str, value: f64 },

    #[error("multiplier `{name}` must be finite and positive, got {value}")]
    InvalidMultiplier { name: &'static str, value: f64 },

    #[error("phase breakpoints out of order: {0}")]
    PhaseBreakpoints(String),

    #[error("invalid window configuration: {0}")]
    InvalidWindow(String),

    #[error("trend threshold must be finite and positive, got {0}")]
    InvalidThreshold(f64),

    #[error("neutral ratio must lie in [0, 1], got {0}")]
    InvalidRatio(f64),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub lookback_seconds: Vec<u32>,
    // Window whose features feed the scorer (also used for future labels).
    pub scoring_window_seconds: u32,
    // Trailing span compared against the full window for the trend signal.
    pub trend_short_seconds: u32,
    pub horizon_seconds: u32,
    pub sampling_step_seconds: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lookback_seconds: vec![120, 180, 300, 600],
            scoring_window_seconds: 180,
            trend_short_seconds: 60,
            horizon_seconds: 300,
            sampling_step_seconds: 60,
        }
    }
}

impl WindowConfig {
    pub fn shortest_lookback(&self) -> u32 {
        self.lookback_seconds.iter().copied().min().unwrap_or(0)
    }
}

/// Component weights. Every field is required when deserializing so a
/// config that forgets one fails at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub version: u32,
    pub shots: f64,
    pub attacking: f64,
    pub possession: f64,
    pub pressure_balance: f64,
    pub disciplinary: f64,
    pub recent_activity: f64,
    pub activity_trend: f64,
    pub goal_advantage: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            version: 1,
            shots: 1.0,
            attacking: 0.6,
            possession: 2.0,
            pressure_balance: 1.5,
            disciplinary: -0.4,
            recent_activity: 0.25,
            activity_trend: 0.3,
            goal_advantage: 1.0,
        }
    }
}

impl ComponentWeights {
    pub fn weight(&self, component: Component) -> f64 {
        match component {
            Component::Shots => self.shots,
            Component::Attacking => self.attacking,
            Component::Possession => self.possession,
            Component::PressureBalance => self.pressure_balance,
            Component::Disciplinary => self.disciplinary,
            Component::RecentActivity => self.recent_activity,
            Component::ActivityTrend => self.activity_trend,
            Component::GoalAdvantage => self.goal_advantage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTable {
    pub opening_end_minute: u32,
    // Closing stage = last N minutes of regulation.
    pub closing_window_minutes: u32,
    // Minutes past regulation still treated as stoppage; later is extra time.
    pub stoppage_allowance_minutes: u32,
    pub opening: f64,
    pub normal: f64,
    pub closing: f64,
    pub stoppage: f64,
    pub extra_time: f64,
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self {
            opening_end_minute: 15,
            closing_window_minutes: 15,
            stoppage_allowance_minutes: 8,
            opening: 1.2,
            normal: 1.0,
            closing: 1.25,
            stoppage: 1.35,
            extra_time: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SituationalTable {
    pub trailing_two_plus: f64,
    pub trailing_one: f64,
    pub level: f64,
    pub leading_one: f64,
    pub leading_two_plus: f64,
    pub group: f64,
    pub league: f64,
    pub knockout: f64,
    #[serde(rename = "final")]
    pub final_stage: f64,
}

impl Default for SituationalTable {
    fn default() -> Self {
        Self {
            trailing_two_plus: 1.2,
            trailing_one: 1.1,
            level: 1.0,
            leading_one: 0.95,
            leading_two_plus: 0.9,
            group: 1.0,
            league: 1.0,
            knockout: 1.1,
            final_stage: 1.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    pub threshold: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self { threshold: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub version: u32,
    pub windows: WindowConfig,
    pub weights: ComponentWeights,
    pub phase: PhaseTable,
    pub situational: SituationalTable,
    pub trend: TrendConfig,
    pub neutral_ratio: f64,
    pub extra_time_allowance_seconds: u32,
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            windows: WindowConfig::default(),
            weights: ComponentWeights::default(),
            phase: PhaseTable::default(),
            situational: SituationalTable::default(),
            trend: TrendConfig::default(),
            neutral_ratio: 0.5,
            extra_time_allowance_seconds: 30 * 60,
            threads: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> std::result::Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::from_json_str(&raw)
            .with_context(|| format!("load config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).context("serialize engine config")?;
        fs::write(&tmp, json).context("write engine config")?;
        fs::rename(&tmp, path).context("swap engine config")?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Unparseable or out-of-range values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("MOMENTUM_HORIZON_SECS").and_then(|v| v.trim().parse::<u32>().ok())
        {
            if v > 0 {
                self.windows.horizon_seconds = v;
            }
        }
        if let Some(v) = lookup("MOMENTUM_STEP_SECS").and_then(|v| v.trim().parse::<u32>().ok()) {
            if v > 0 {
                self.windows.sampling_step_seconds = v;
            }
        }
        if let Some(v) = lookup("MOMENTUM_THREADS").and_then(|v| v.trim().parse::<usize>().ok()) {
            self.threads = Some(v.clamp(1, 64));
        }
        if let Some(v) =
            lookup("MOMENTUM_TREND_THRESHOLD").and_then(|v| v.trim().parse::<f64>().ok())
        {
            if v.is_finite() && v > 0.0 {
                self.trend.threshold = v;
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                expected: CONFIG_VERSION,
            });
        }

        for component in Component::ALL {
            let value = self.weights.weight(component);
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteWeight {
                    component: component.name(),
                    value,
                });
            }
        }

        let p = &self.phase;
        for (name, value) in [
            ("phase.opening", p.opening),
            ("phase.normal", p.normal),
            ("phase.closing", p.closing),
            ("phase.stoppage", p.stoppage),
            ("phase.extra_time", p.extra_time),
        ] {
            check_multiplier(name, value)?;
        }
        if p.opening_end_minute == 0 {
            return Err(ConfigError::PhaseBreakpoints(
                "opening_end_minute must be positive".to_string(),
            ));
        }
        if p.stoppage_allowance_minutes == 0 {
            return Err(ConfigError::PhaseBreakpoints(
                "stoppage_allowance_minutes must be positive".to_string(),
            ));
        }
        if p.opening_end_minute + p.closing_window_minutes > DEFAULT_REGULATION_MINUTES {
            return Err(ConfigError::PhaseBreakpoints(format!(
                "opening ends at {} but closing covers the last {} minutes",
                p.opening_end_minute, p.closing_window_minutes
            )));
        }

        let s = &self.situational;
        for (name, value) in [
            ("situational.trailing_two_plus", s.trailing_two_plus),
            ("situational.trailing_one", s.trailing_one),
            ("situational.level", s.level),
            ("situational.leading_one", s.leading_one),
            ("situational.leading_two_plus", s.leading_two_plus),
            ("situational.group", s.group),
            ("situational.league", s.league),
            ("situational.knockout", s.knockout),
            ("situational.final", s.final_stage),
        ] {
            check_multiplier(name, value)?;
        }

        let w = &self.windows;
        if w.lookback_seconds.is_empty() {
            return Err(ConfigError::InvalidWindow(
                "at least one look-back window is required".to_string(),
            ));
        }
        if w.lookback_seconds.contains(&0) {
            return Err(ConfigError::InvalidWindow(
                "look-back windows must be positive".to_string(),
            ));
        }
        if w.scoring_window_seconds == 0 {
            return Err(ConfigError::InvalidWindow(
                "scoring window must be positive".to_string(),
            ));
        }
        if w.trend_short_seconds == 0 {
            return Err(ConfigError::InvalidWindow(
                "trend short span must be positive".to_string(),
            ));
        }
        // A span covering the whole window leaves the trend signal at zero.
        if w.trend_short_seconds >= w.scoring_window_seconds {
            return Err(ConfigError::InvalidWindow(format!(
                "trend short span {}s must be shorter than the {}s scoring window",
                w.trend_short_seconds, w.scoring_window_seconds
            )));
        }
        if w.trend_short_seconds >= w.shortest_lookback() {
            return Err(ConfigError::InvalidWindow(format!(
                "trend short span {}s must be shorter than the {}s shortest look-back",
                w.trend_short_seconds,
                w.shortest_lookback()
            )));
        }
        if w.horizon_seconds == 0 {
            return Err(ConfigError::InvalidWindow("horizon must be positive".to_string()));
        }
        if w.sampling_step_seconds == 0 {
            return Err(ConfigError::InvalidWindow(
                "sampling step must be positive".to_string(),
            ));
        }

        if !self.trend.threshold.is_finite() || self.trend.threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(self.trend.threshold));
        }
        if !(0.0..=1.0).contains(&self.neutral_ratio) {
            return Err(ConfigError::InvalidRatio(self.neutral_ratio));
        }
        Ok(())
    }

    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(json.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

fn check_multiplier(name: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidMultiplier { name, value })
    }
}
