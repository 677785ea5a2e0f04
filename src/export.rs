use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::event::EVENT_TAXONOMY_VERSION;
use crate::features::{FEATURE_SCHEMA_VERSION, sample_feature_names};
use crate::samples::Sample;
use crate::split::{Partition, SplitAssignment};
use crate::target::TrendLabel;
use crate::{MatchId, TeamId};

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub match_id: MatchId,
    pub entity: TeamId,
    pub opponent: TeamId,
    pub reference_time: u32,
    pub features: Vec<f64>,
    pub current_momentum: f64,
    pub future_momentum: f64,
    pub momentum_change: f64,
    pub trend_label: TrendLabel,
    #[serde(default)]
    pub partition: Option<Partition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleExport {
    pub version: u32,
    pub feature_schema_version: u32,
    pub event_taxonomy_version: u32,
    pub generated_at: String,
    pub config_fingerprint: String,
    pub feature_names: Vec<String>,
    pub rows: Vec<ExportRow>,
}

impl SampleExport {
    pub fn from_samples(
        samples: &[Sample],
        cfg: &EngineConfig,
        split: Option<&SplitAssignment>,
    ) -> Self {
        let feature_names = sample_feature_names(cfg);
        let rows = samples
            .iter()
            .map(|s| ExportRow {
                match_id: s.match_id,
                entity: s.entity,
                opponent: s.opponent,
                reference_time: s.reference_time,
                features: s.current_features.to_row(&feature_names, cfg.neutral_ratio),
                current_momentum: s.current_momentum.value,
                future_momentum: s.future_momentum.value,
                momentum_change: s.momentum_change,
                trend_label: s.trend_label,
                partition: split.and_then(|a| a.partition_of(s.match_id)),
            })
            .collect();
        Self {
            version: EXPORT_VERSION,
            feature_schema_version: FEATURE_SCHEMA_VERSION,
            event_taxonomy_version: EVENT_TAXONOMY_VERSION,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            config_fingerprint: cfg.fingerprint(),
            feature_names,
            rows,
        }
    }

    pub fn matrix(&self, only: Option<Partition>) -> (Vec<Vec<f64>>, Vec<f64>) {
        self.rows
            .iter()
            .filter(|r| only.is_none() || r.partition == only)
            .map(|r| (r.features.clone(), r.future_momentum))
            .unzip()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create export dir {}", dir.display()))?;
        }
        let json = serde_json::to_string(self).context("serialize sample export")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read export {}", path.display()))?;
        let export: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse export {}", path.display()))?;
        Ok(export)
    }
}
