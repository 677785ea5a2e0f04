use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use match_momentum::event_log;
use match_momentum::synthetic::SyntheticMatch;
use match_momentum::target::{classify_trend, future_target};
use match_momentum::{EngineConfig, MatchEvents, MatchId, Scorer};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut cfg = match parse_value_arg("--config") {
        Some(path) => EngineConfig::load(&PathBuf::from(path))?,
        None => EngineConfig::default(),
    };
    cfg.apply_env_overrides();
    let scorer = Scorer::new(&cfg).context("invalid engine config")?;

    let match_id = parse_value_arg("--match")
        .and_then(|v| v.parse::<u64>().ok())
        .map(MatchId);
    let m = load_match(match_id)?;

    let teams = m.teams();
    let [home, away] = teams.as_slice() else {
        return Err(anyhow!(
            "{} has {} teams, expected 2",
            m.match_id(),
            teams.len()
        ));
    };
    let (home, away) = (*home, *away);
    let step = parse_value_arg("--step")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(60)
        .max(1);
    let horizon = cfg.windows.horizon_seconds;

    println!("{} {} vs {}", m.match_id(), home, away);
    println!("{:>5}  {:>6}  {:>6}  {:>9}  {:<10}", "min", "home", "away", "home_fut", "phase");
    let end = m.end_seconds();
    let mut t = step;
    while t <= end {
        let h = scorer.current_momentum(&m, home, away, t)?;
        let a = scorer.current_momentum(&m, away, home, t)?;
        let future = future_target(&m, home, away, t, horizon, &scorer)?;
        let future_col = match &future {
            Some(f) => format!(
                "{:.2} {}",
                f.value,
                classify_trend(f.value - h.value, cfg.trend.threshold).as_str()
            ),
            None => "-".to_string(),
        };
        println!(
            "{:>5}  {:>6.2}  {:>6.2}  {:>9}  {:<10}",
            t / 60,
            h.value,
            a.value,
            future_col,
            h.phase.as_str()
        );
        t += step;
    }
    Ok(())
}

fn load_match(match_id: Option<MatchId>) -> Result<MatchEvents> {
    if let Some(seed) = parse_value_arg("--synthetic").and_then(|v| v.parse::<u64>().ok()) {
        let id = match_id.unwrap_or(MatchId(1));
        return Ok(SyntheticMatch::new(id).generate(seed));
    }
    let path = std::env::args()
        .skip(1)
        .find(|arg| !arg.starts_with("--") && arg.ends_with(".jsonl"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/events.jsonl"));
    let (log, _) = event_log::load_json_lines(&path)?;
    let m = match match_id {
        Some(id) => log.get(id).cloned(),
        None => log.matches().next().cloned(),
    };
    m.with_context(|| format!("no such match in {}", path.display()))
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
