//! Match-level train/test partitioning. Samples from one match always land
//! on the same side so overlapping windows never leak across the boundary.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::samples::Sample;
use crate::MatchId;

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("no samples to split")]
    NoSamples,

    #[error("train fraction must lie strictly between 0 and 1, got {0}")]
    InvalidFraction(f64),

    #[error("{folds} folds requested but only {matches} distinct matches")]
    InvalidFoldCount { folds: usize, matches: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Train,
    Test,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitAssignment {
    pub assignments: BTreeMap<MatchId, Partition>,
}

impl SplitAssignment {
    pub fn partition_of(&self, id: MatchId) -> Option<Partition> {
        self.assignments.get(&id).copied()
    }

    pub fn train_matches(&self) -> Vec<MatchId> {
        self.matches_in(Partition::Train)
    }

    pub fn test_matches(&self) -> Vec<MatchId> {
        self.matches_in(Partition::Test)
    }

    fn matches_in(&self, part: Partition) -> Vec<MatchId> {
        self.assignments
            .iter()
            .filter(|(_, p)| **p == part)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn partition<'s>(&self, samples: &'s [Sample]) -> (Vec<&'s Sample>, Vec<&'s Sample>) {
        let mut train = Vec::new();
        let mut test = Vec::new();
        for s in samples {
            match self.partition_of(s.match_id) {
                Some(Partition::Train) => train.push(s),
                Some(Partition::Test) => test.push(s),
                None => {}
            }
        }
        (train, test)
    }

    pub fn is_disjoint_cover(&self, samples: &[Sample]) -> bool {
        let (train, test) = self.partition(samples);
        let train_ids: BTreeSet<MatchId> = train.iter().map(|s| s.match_id).collect();
        let test_ids: BTreeSet<MatchId> = test.iter().map(|s| s.match_id).collect();
        train.len() + test.len() == samples.len() && train_ids.is_disjoint(&test_ids)
    }
}

fn distinct_matches(samples: &[Sample]) -> Vec<MatchId> {
    samples
        .iter()
        .map(|s| s.match_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn shuffled_matches(samples: &[Sample], seed: u64) -> Vec<MatchId> {
    let mut ids = distinct_matches(samples);
    let mut rng = StdRng::seed_from_u64(seed);
    ids.shuffle(&mut rng);
    ids
}

/// Number of train matches out of `n`; keeps at least one match per side.
pub fn train_count(n: usize, train_fraction: f64) -> usize {
    if n < 2 {
        return n;
    }
    let idx = ((n as f64) * train_fraction).round() as usize;
    idx.clamp(1, n - 1)
}

/// Seeded match-level split. A single match goes entirely to train.
pub fn split(
    samples: &[Sample],
    train_fraction: f64,
    seed: u64,
) -> Result<SplitAssignment, SplitError> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(SplitError::InvalidFraction(train_fraction));
    }
    let ids = shuffled_matches(samples, seed);
    if ids.is_empty() {
        return Err(SplitError::NoSamples);
    }
    let cut = train_count(ids.len(), train_fraction);
    let assignments = ids
        .into_iter()
        .enumerate()
        .map(|(idx, id)| {
            let part = if idx < cut {
                Partition::Train
            } else {
                Partition::Test
            };
            (id, part)
        })
        .collect();
    Ok(SplitAssignment { assignments })
}

pub fn match_kfold(
    samples: &[Sample],
    k: usize,
    seed: u64,
) -> Result<Vec<SplitAssignment>, SplitError> {
    let ids = shuffled_matches(samples, seed);
    if ids.is_empty() {
        return Err(SplitError::NoSamples);
    }
    if k < 2 || k > ids.len() {
        return Err(SplitError::InvalidFoldCount {
            folds: k,
            matches: ids.len(),
        });
    }
    let folds = (0..k)
        .map(|fold| {
            let assignments = ids
                .iter()
                .enumerate()
                .map(|(idx, id)| {
                    let part = if idx % k == fold {
                        Partition::Test
                    } else {
                        Partition::Train
                    };
                    (*id, part)
                })
                .collect();
            SplitAssignment { assignments }
        })
        .collect();
    Ok(folds)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub index: usize,
    pub train_matches: Vec<MatchId>,
    pub test_matches: Vec<MatchId>,
}

impl Fold {
    pub fn assignment(&self) -> SplitAssignment {
        let assignments = self
            .train_matches
            .iter()
            .map(|id| (*id, Partition::Train))
            .chain(self.test_matches.iter().map(|id| (*id, Partition::Test)))
            .collect();
        SplitAssignment { assignments }
    }

    pub fn partition<'s>(&self, samples: &'s [Sample]) -> (Vec<&'s Sample>, Vec<&'s Sample>) {
        self.assignment().partition(samples)
    }
}

/// Walk-forward folds over matches in id order, so match ids must be
/// assigned in kickoff order. The matches are cut into `n_folds + 1`
/// contiguous blocks; fold `i` trains on blocks `0..=i` and tests on
/// block `i + 1`.
pub fn expanding_window_folds(samples: &[Sample], n_folds: usize) -> Result<Vec<Fold>, SplitError> {
    let mut ordered: Vec<&Sample> = samples.iter().collect();
    ordered.sort_by_key(|s| (s.match_id, s.reference_time));
    let mut ids: Vec<MatchId> = ordered.iter().map(|s| s.match_id).collect();
    ids.dedup();
    if ids.is_empty() {
        return Err(SplitError::NoSamples);
    }
    let blocks = n_folds + 1;
    if n_folds == 0 || blocks > ids.len() {
        return Err(SplitError::InvalidFoldCount {
            folds: n_folds,
            matches: ids.len(),
        });
    }
    let n = ids.len();
    let bound = |j: usize| j * n / blocks;
    let folds = (0..n_folds)
        .map(|i| Fold {
            index: i,
            train_matches: ids[..bound(i + 1)].to_vec(),
            test_matches: ids[bound(i + 1)..bound(i + 2)].to_vec(),
        })
        .collect();
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use crate::scoring::{MatchPhase, MomentumScore};
    use crate::target::TrendLabel;
    use crate::TeamId;

    fn flat_score(match_id: MatchId, reference_time: u32) -> MomentumScore {
        MomentumScore {
            match_id,
            entity: TeamId(1),
            reference_time,
            value: 1.0,
            raw: 1.0,
            phase: MatchPhase::Normal,
            phase_multiplier: 1.0,
            situational_multiplier: 1.0,
            component_breakdown: BTreeMap::new(),
        }
    }

    fn samples(matches: &[u64], per_match: u32) -> Vec<Sample> {
        let mut out = Vec::new();
        for &m in matches {
            for i in 0..per_match {
                out.push(Sample {
                    match_id: MatchId(m),
                    entity: TeamId(1),
                    opponent: TeamId(2),
                    reference_time: 120 + i * 60,
                    current_features: FeatureVector::new(),
                    current_momentum: flat_score(MatchId(m), 120 + i * 60),
                    future_momentum: flat_score(MatchId(m), 120 + i * 60),
                    momentum_change: 0.0,
                    trend_label: TrendLabel::Stable,
                });
            }
        }
        out
    }

    #[test]
    fn train_count_keeps_both_sides() {
        assert_eq!(train_count(1, 0.8), 1);
        assert_eq!(train_count(2, 0.99), 1);
        assert_eq!(train_count(10, 0.85), 9);
        assert_eq!(train_count(10, 0.01), 1);
    }

    #[test]
    fn split_is_seeded() {
        let s = samples(&[1, 2, 3, 4, 5, 6, 7, 8], 3);
        let a = split(&s, 0.75, 7).unwrap();
        let b = split(&s, 0.75, 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.train_matches().len(), 6);
        assert!(a.is_disjoint_cover(&s));
    }

    #[test]
    fn single_match_goes_to_train() {
        let s = samples(&[3], 4);
        let a = split(&s, 0.5, 1).unwrap();
        assert_eq!(a.train_matches(), vec![MatchId(3)]);
        assert!(a.test_matches().is_empty());
    }

    #[test]
    fn bad_fraction_and_empty_input() {
        let s = samples(&[1, 2], 1);
        assert_eq!(split(&s, 1.0, 0).unwrap_err(), SplitError::InvalidFraction(1.0));
        assert_eq!(split(&[], 0.5, 0).unwrap_err(), SplitError::NoSamples);
    }

    #[test]
    fn kfold_tests_each_match_once() {
        let s = samples(&[1, 2, 3, 4, 5], 2);
        let folds = match_kfold(&s, 3, 11).unwrap();
        assert_eq!(folds.len(), 3);
        let mut tested: Vec<MatchId> = folds.iter().flat_map(|f| f.test_matches()).collect();
        tested.sort();
        assert_eq!(tested, (1..=5).map(MatchId).collect::<Vec<_>>());
        assert!(folds.iter().all(|f| f.is_disjoint_cover(&s)));
        assert!(match_kfold(&s, 6, 11).is_err());
    }

    #[test]
    fn expanding_folds_walk_forward() {
        let s = samples(&[10, 20, 30, 40, 50, 60], 2);
        let folds = expanding_window_folds(&s, 2).unwrap();
        assert_eq!(folds[0].train_matches, vec![MatchId(10), MatchId(20)]);
        assert_eq!(folds[0].test_matches, vec![MatchId(30), MatchId(40)]);
        assert_eq!(folds[1].train_matches.len(), 4);
        assert_eq!(folds[1].test_matches, vec![MatchId(50), MatchId(60)]);
        for f in &folds {
            let last_train = f.train_matches.last().unwrap();
            assert!(f.test_matches.iter().all(|id| id > last_train));
            let (train, test) = f.partition(&s);
            assert_eq!(train.len(), f.train_matches.len() * 2);
            assert_eq!(test.len(), 4);
        }
        assert!(expanding_window_folds(&s, 6).is_err());
    }
}
