use std::fs;
use std::path::Path;

use match_momentum::config::ConfigError;
use match_momentum::scoring::{MatchPhase, SituationalContext};
use match_momentum::{EngineConfig, FeatureVector, Scorer};

#[test]
fn fixture_config_loads() {
    let cfg = EngineConfig::load(Path::new("tests/fixtures/engine_config.json")).unwrap();
    assert_eq!(cfg.windows.lookback_seconds, vec![120, 300]);
    assert_eq!(cfg.weights.version, 2);
    assert_eq!(cfg.situational.final_stage, 1.25);
    assert_eq!(cfg.threads, None);
    assert_ne!(cfg.fingerprint(), EngineConfig::default().fingerprint());

    let scorer = Scorer::new(&cfg).unwrap();
    let mut fv = FeatureVector::new();
    fv.insert("shot_count", 1.0);
    let parts = scorer.score_vector(&fv, MatchPhase::Closing, &SituationalContext::none());
    assert_eq!(parts.components["shots"], 1.2);
    assert_eq!(parts.phase_multiplier, 1.3);
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("engine.json");
    let mut cfg = EngineConfig::default();
    cfg.windows.horizon_seconds = 420;
    cfg.threads = Some(4);
    cfg.save(&path).unwrap();
    assert!(!path.with_extension("json.tmp").exists());
    let loaded = EngineConfig::load(&path).unwrap();
    assert_eq!(loaded.windows.horizon_seconds, 420);
    assert_eq!(loaded.threads, Some(4));
    assert_eq!(loaded.fingerprint(), cfg.fingerprint());
}

#[test]
fn invalid_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    let mut value = serde_json::to_value(EngineConfig::default()).unwrap();
    value["version"] = serde_json::json!(7);
    fs::write(&path, value.to_string()).unwrap();
    let err = EngineConfig::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("bad.json"));
    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::UnsupportedVersion {
            found: 7,
            expected: 1
        })
    );
}

#[test]
fn save_reports_unusable_directory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let err = EngineConfig::default()
        .save(&blocker.join("engine.json"))
        .unwrap_err();
    assert!(format!("{err:#}").contains("create config dir"));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(EngineConfig::load(&dir.path().join("absent.json")).is_err());
}
