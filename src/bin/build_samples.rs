use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::info;
use tracing_subscriber::EnvFilter;

use match_momentum::event_log::{self, EventLog};
use match_momentum::export::SampleExport;
use match_momentum::progress::TracingObserver;
use match_momentum::split::{self, Partition};
use match_momentum::synthetic::SyntheticFeed;
use match_momentum::target::TrendLabel;
use match_momentum::{EngineConfig, SampleBuilder, Scorer};

const DEFAULT_TRAIN_FRACTION: f64 = 0.8;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_SYNTHETIC_SEED: u64 = 7;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut cfg = match parse_path_arg("--config") {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };
    cfg.apply_env_overrides();
    cfg.validate().context("invalid engine config")?;

    let log = if let Some(n) = parse_usize_arg("--synthetic") {
        let seed = parse_u64_arg("--synthetic-seed").unwrap_or(DEFAULT_SYNTHETIC_SEED);
        info!(matches = n, seed, "generating synthetic matches");
        EventLog::from_source(&SyntheticFeed::new(n, seed))
    } else {
        let path = first_positional_arg()
            .ok_or_else(|| anyhow!("usage: build_samples <events.jsonl> | --synthetic N"))?;
        let (log, stats) = event_log::load_json_lines(&path)?;
        info!(
            path = %path.display(),
            events = stats.events,
            malformed = stats.malformed,
            matches = log.len(),
            "loaded event log"
        );
        log
    };

    let scorer = Scorer::new(&cfg)?;
    let report = SampleBuilder::new(&scorer)
        .with_observer(&TracingObserver)
        .build(&log);

    let train_fraction = parse_f64_arg("--train-fraction")
        .unwrap_or(DEFAULT_TRAIN_FRACTION)
        .clamp(0.05, 0.95);
    let seed = parse_u64_arg("--seed").unwrap_or(DEFAULT_SEED);

    println!("Matches: {}", report.matches_seen);
    println!("Matches with samples: {}", report.matches_with_samples());
    println!("Samples: {}", report.samples.len());
    println!("Skipped (no recent events): {}", report.samples_without_signal);
    println!("Skipped (horizon past end): {}", report.samples_without_label);
    for skipped in &report.skipped {
        println!("Skipped match {}: {}", skipped.match_id, skipped.reason);
    }
    if report.samples.is_empty() {
        return Ok(());
    }

    let counts = [TrendLabel::Increasing, TrendLabel::Stable, TrendLabel::Decreasing]
        .map(|label| {
            let n = report.samples.iter().filter(|s| s.trend_label == label).count();
            format!("{}={n}", label.as_str())
        })
        .join(" ");
    println!("Trend labels: {counts}");
    let mean = report.samples.iter().map(|s| s.current_momentum.value).sum::<f64>()
        / report.samples.len() as f64;
    println!("Mean momentum: {mean:.3}");

    let assignment = split::split(&report.samples, train_fraction, seed)?;
    let (train, test) = assignment.partition(&report.samples);
    println!(
        "Split: train {} matches / {} samples, test {} matches / {} samples",
        assignment.train_matches().len(),
        train.len(),
        assignment.test_matches().len(),
        test.len()
    );

    if let Some(out) = parse_path_arg("--out") {
        let export = SampleExport::from_samples(&report.samples, &cfg, Some(&assignment));
        export.save(&out)?;
        let (x_train, _) = export.matrix(Some(Partition::Train));
        println!(
            "Wrote {} rows x {} features to {} ({} train rows)",
            export.rows.len(),
            export.feature_names.len(),
            out.display(),
            x_train.len()
        );
    }
    Ok(())
}

fn first_positional_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut skip_next = false;
    for arg in &args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            skip_next = !arg.contains('=');
            continue;
        }
        return Some(PathBuf::from(arg));
    }
    None
}

fn parse_value_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && !raw.trim().is_empty()
        {
            return Some(raw.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_value_arg(name).map(PathBuf::from)
}

fn parse_f64_arg(name: &str) -> Option<f64> {
    parse_value_arg(name).and_then(|v| v.parse::<f64>().ok())
}

fn parse_u64_arg(name: &str) -> Option<u64> {
    parse_value_arg(name).and_then(|v| v.parse::<u64>().ok())
}

fn parse_usize_arg(name: &str) -> Option<usize> {
    parse_value_arg(name).and_then(|v| v.parse::<usize>().ok())
}
