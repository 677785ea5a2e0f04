use std::path::Path;
use std::sync::mpsc;

use match_momentum::event_log::{self, EventLog};
use match_momentum::export::SampleExport;
use match_momentum::progress::BuildProgress;
use match_momentum::samples::{SkipReason, SkippedMatch, build_samples};
use match_momentum::split::{self, Partition};
use match_momentum::synthetic::SyntheticFeed;
use match_momentum::{EngineConfig, MatchId, SampleBuilder, Scorer, TeamId};

fn fixture_log() -> EventLog {
    let (log, stats) =
        event_log::load_json_lines(Path::new("tests/fixtures/events.jsonl")).unwrap();
    assert_eq!(stats.malformed, 2);
    assert_eq!(stats.matches_declared, 3);
    assert_eq!(stats.events, 83);
    log
}

#[test]
fn fixture_build_counts() {
    let scorer = Scorer::new(&EngineConfig::default()).unwrap();
    let report = SampleBuilder::new(&scorer).build(&fixture_log());
    assert_eq!(report.matches_seen, 3);
    assert_eq!(report.samples.len(), 28);
    assert_eq!(report.samples_without_label, 10);
    assert_eq!(report.samples_without_signal, 0);
    assert_eq!(
        report.skipped,
        vec![
            SkippedMatch {
                match_id: MatchId(102),
                reason: SkipReason::TeamCount(1),
            },
            SkippedMatch {
                match_id: MatchId(103),
                reason: SkipReason::NoEvents,
            },
        ]
    );
    let keys: Vec<(MatchId, TeamId, u32)> = report
        .samples
        .iter()
        .map(|s| (s.match_id, s.entity, s.reference_time))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert!(report.samples.iter().all(|s| {
        (s.momentum_change - (s.future_momentum.value - s.current_momentum.value)).abs() < 1e-12
    }));
}

#[test]
fn score_state_carries_into_features() {
    let scorer = Scorer::new(&EngineConfig::default()).unwrap();
    let report = SampleBuilder::new(&scorer).build(&fixture_log());
    let after_goal = report
        .samples
        .iter()
        .find(|s| s.entity == TeamId(20) && s.reference_time == 660)
        .unwrap();
    assert_eq!(after_goal.current_features.get("score_diff"), Some(-1.0));
    assert_eq!(after_goal.current_features.get("opponent_goals"), Some(1.0));
    let before_goal = report
        .samples
        .iter()
        .find(|s| s.entity == TeamId(10) && s.reference_time == 600)
        .unwrap();
    assert_eq!(before_goal.current_features.get("team_goals"), Some(0.0));
}

#[test]
fn build_is_deterministic_across_pools() {
    let log = EventLog::from_source(&SyntheticFeed::new(6, 21));
    let cfg = EngineConfig::default();
    let single = {
        let cfg = EngineConfig {
            threads: Some(1),
            ..cfg.clone()
        };
        let scorer = Scorer::new(&cfg).unwrap();
        SampleBuilder::new(&scorer).build(&log)
    };
    let scorer = Scorer::new(&cfg).unwrap();
    let default_pool = SampleBuilder::new(&scorer).build(&log);
    assert_eq!(single.samples, default_pool.samples);
    assert!(!single.samples.is_empty());

    let a = split::split(&single.samples, 0.7, 5).unwrap();
    let b = split::split(&default_pool.samples, 0.7, 5).unwrap();
    assert_eq!(a, b);
}

#[test]
fn observer_sees_every_match() {
    let (tx, rx) = mpsc::channel();
    let scorer = Scorer::new(&EngineConfig::default()).unwrap();
    let report = SampleBuilder::new(&scorer)
        .with_observer(&tx)
        .build(&fixture_log());
    drop(tx);
    let events: Vec<BuildProgress> = rx.iter().collect();
    let started = events
        .iter()
        .filter(|e| matches!(e, BuildProgress::MatchStarted { .. }))
        .count();
    let skipped = events
        .iter()
        .filter(|e| matches!(e, BuildProgress::MatchSkipped { .. }))
        .count();
    assert_eq!(started, 3);
    assert_eq!(skipped, 2);
    assert_eq!(
        events.last(),
        Some(&BuildProgress::Finished {
            matches: 3,
            samples: report.samples.len(),
            skipped: 2,
        })
    );
}

#[test]
fn explicit_parameters_override_config() {
    let log = fixture_log();
    let report = build_samples(&log, 120, &[240], 240, &EngineConfig::default()).unwrap();
    // 240..=960 labelled for both teams.
    assert_eq!(report.samples.len(), 2 * 7);
    assert!(report.samples.iter().all(|s| s.reference_time % 120 == 0));
    assert!(report.samples[0].current_features.get("events_count_4m").is_some());

    assert!(build_samples(&log, 0, &[240], 240, &EngineConfig::default()).is_err());
}

#[test]
fn export_round_trips_through_disk() {
    let cfg = EngineConfig::default();
    let scorer = Scorer::new(&cfg).unwrap();
    let report = SampleBuilder::new(&scorer).build(&fixture_log());
    let mut samples = report.samples.clone();
    // Fake a second match so the split has two sides.
    samples.extend(report.samples.iter().cloned().map(|mut s| {
        s.match_id = MatchId(900);
        s
    }));
    let assignment = split::split(&samples, 0.5, 1).unwrap();
    let export = SampleExport::from_samples(&samples, &cfg, Some(&assignment));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("samples.json");
    export.save(&path).unwrap();
    let loaded = SampleExport::load(&path).unwrap();
    assert_eq!(loaded.feature_names, export.feature_names);
    assert_eq!(loaded.config_fingerprint, cfg.fingerprint());
    assert_eq!(loaded.rows.len(), 56);
    let (train, y_train) = loaded.matrix(Some(Partition::Train));
    let (test, _) = loaded.matrix(Some(Partition::Test));
    assert_eq!(train.len(), 28);
    assert_eq!(test.len(), 28);
    assert_eq!(y_train.len(), train.len());
    assert!(train.iter().all(|row| row.len() == loaded.feature_names.len()));
}
