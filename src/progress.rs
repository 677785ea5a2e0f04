use std::sync::mpsc::Sender;

use tracing::{debug, info};

use crate::MatchId;

#[derive(Debug, Clone, PartialEq)]
pub enum BuildProgress {
    MatchStarted {
        match_id: MatchId,
        index: usize,
        total: usize,
    },
    MatchFinished {
        match_id: MatchId,
        samples: usize,
    },
    MatchSkipped {
        match_id: MatchId,
        reason: String,
    },
    Finished {
        matches: usize,
        samples: usize,
        skipped: usize,
    },
}

/// Receives builder progress. Called from rayon workers, so it must be `Sync`.
pub trait ProgressObserver: Sync {
    fn on_progress(&self, event: BuildProgress);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _event: BuildProgress) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_progress(&self, event: BuildProgress) {
        match event {
            BuildProgress::MatchStarted {
                match_id,
                index,
                total,
            } => debug!(%match_id, index, total, "match started"),
            BuildProgress::MatchFinished { match_id, samples } => {
                debug!(%match_id, samples, "match finished")
            }
            BuildProgress::MatchSkipped { match_id, reason } => {
                debug!(%match_id, %reason, "match skipped")
            }
            BuildProgress::Finished {
                matches,
                samples,
                skipped,
            } => info!(matches, samples, skipped, "sample build finished"),
        }
    }
}

impl ProgressObserver for Sender<BuildProgress> {
    fn on_progress(&self, event: BuildProgress) {
        let _ = self.send(event);
    }
}
