pub mod config;
pub mod event;
pub mod event_log;
pub mod export;
pub mod features;
pub mod progress;
pub mod samples;
pub mod scoring;
pub mod split;
pub mod synthetic;
pub mod target;
pub mod window;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use config::{ConfigError, EngineConfig};
pub use event::{Event, EventKind, MatchInfo};
pub use event_log::{EventLog, EventSource, MatchEvents};
pub use features::FeatureVector;
pub use samples::{BuildReport, Sample, SampleBuilder};
pub use scoring::{MomentumScore, Scorer};
pub use split::{Partition, SplitAssignment};
pub use target::TrendLabel;
pub use window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Match({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub u32);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}
