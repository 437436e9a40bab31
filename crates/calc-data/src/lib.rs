#![deny(warnings)]

//! Static lookup tables and calculator presets loaded from YAML assets.
//!
//! Expected layout under the assets root:
//! - `yields.yaml`: base yield rows keyed by origin and difficulty
//! - `levels.yaml`: EXP curve, consumable yield brackets, level-skip bonuses
//! - `presets/*.yaml`: one ladder calculator variant per file
//! - `planner.yaml`: optional planner configuration

use calc_core::{
    validate_source, BonusRule, LevelBracket, LevelTable, ResourceSource, ThresholdLadder,
    ValidationError, YieldRow, YieldTable,
};
use calc_ladder::{LadderCalculator, MonthBoundary, ProjectionConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("io error: {0}")]
    Io(String),
    #[error("failed to parse {file}: {msg}")]
    Parse { file: String, msg: String },
    #[error("invalid data: {0}")]
    Invalid(String),
    #[error("unknown {kind}: {id}")]
    Unknown { kind: &'static str, id: String },
}

impl From<std::io::Error> for DataError {
    fn from(e: std::io::Error) -> Self {
        DataError::Io(e.to_string())
    }
}

impl From<ValidationError> for DataError {
    fn from(e: ValidationError) -> Self {
        DataError::Invalid(e.to_string())
    }
}

fn default_max_level_iterations() -> u32 {
    100_000
}

/// Planner-wide configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Projection policy used by presets that do not override it.
    #[serde(default)]
    pub projection: ProjectionConfig,
    /// Iteration cap of the level simulator.
    #[serde(default = "default_max_level_iterations")]
    pub max_level_iterations: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            projection: ProjectionConfig::default(),
            max_level_iterations: default_max_level_iterations(),
        }
    }
}

impl PlannerConfig {
    pub fn load(path: &Path) -> Result<Self, DataError> {
        read_yaml(path)
    }
}

/// Named stage of a ladder preset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDef {
    pub name: String,
    pub threshold: u64,
}

/// Per-preset projection fields; unset fields inherit the planner policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionOverride {
    #[serde(default)]
    pub month_boundary: Option<MonthBoundary>,
    #[serde(default)]
    pub monthly_claimed_at_start: Option<bool>,
    #[serde(default)]
    pub max_periods: Option<u32>,
}

impl ProjectionOverride {
    pub fn apply(&self, base: &ProjectionConfig) -> ProjectionConfig {
        ProjectionConfig {
            month_boundary: self.month_boundary.unwrap_or(base.month_boundary),
            monthly_claimed_at_start: self
                .monthly_claimed_at_start
                .unwrap_or(base.monthly_claimed_at_start),
            max_periods: self.max_periods.or(base.max_periods),
        }
    }
}

/// One ladder calculator variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatorPreset {
    pub id: String,
    pub title: String,
    /// Display name of the accumulated resource.
    pub unit: String,
    pub stages: Vec<StageDef>,
    /// Sources offered by the calculator, with their default toggles.
    #[serde(default)]
    pub sources: Vec<ResourceSource>,
    /// Field-wise overrides of the planner-wide projection policy.
    #[serde(default)]
    pub projection: ProjectionOverride,
}

impl CalculatorPreset {
    pub fn ladder(&self) -> Result<ThresholdLadder, ValidationError> {
        ThresholdLadder::new(self.stages.iter().map(|s| s.threshold).collect())
    }

    /// Calculator for this variant: the planner policy with this preset's overrides.
    pub fn calculator(&self, planner: &PlannerConfig) -> Result<LadderCalculator, ValidationError> {
        let config = self.projection.apply(&planner.projection);
        Ok(LadderCalculator::new(self.ladder()?, config))
    }

    pub fn stage_name(&self, index: usize) -> &str {
        self.stages.get(index).map_or("?", |s| s.name.as_str())
    }
}

/// Consumable with a per-level yield curve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Consumable {
    pub id: String,
    pub name: String,
    pub yields: LevelTable,
}

/// Named level-skip rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusPreset {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub rule: BonusRule,
}

#[derive(Deserialize)]
struct YieldsFile {
    rows: Vec<YieldRow>,
}

#[derive(Deserialize)]
struct ConsumableFile {
    id: String,
    name: String,
    brackets: Vec<LevelBracket>,
}

#[derive(Deserialize)]
struct LevelsFile {
    exp: BTreeMap<u32, u64>,
    #[serde(default)]
    consumables: Vec<ConsumableFile>,
    #[serde(default)]
    bonuses: Vec<BonusPreset>,
}

/// Every static table the calculators consume.
#[derive(Clone, Debug, Default)]
pub struct DataSet {
    pub yields: YieldTable,
    pub presets: Vec<CalculatorPreset>,
    pub exp: LevelTable,
    pub consumables: Vec<Consumable>,
    pub bonuses: Vec<BonusPreset>,
    pub planner: PlannerConfig,
}

impl DataSet {
    /// Load all tables from an assets directory.
    pub fn load_dir<P: AsRef<Path>>(root: P) -> Result<Self, DataError> {
        let root = root.as_ref();
        let yields_file: YieldsFile = read_yaml(&root.join("yields.yaml"))?;
        let yields = YieldTable::from_rows(yields_file.rows)?;

        let levels: LevelsFile = read_yaml(&root.join("levels.yaml"))?;
        let mut consumables = Vec::with_capacity(levels.consumables.len());
        for c in levels.consumables {
            consumables.push(Consumable {
                yields: LevelTable::from_brackets(&c.brackets)?,
                id: c.id,
                name: c.name,
            });
        }

        let planner_path = root.join("planner.yaml");
        let planner = if planner_path.exists() {
            PlannerConfig::load(&planner_path)?
        } else {
            PlannerConfig::default()
        };

        let presets = load_presets(&root.join("presets"), &yields)?;
        info!(
            root = %root.display(),
            yield_rows = yields.len(),
            presets = presets.len(),
            consumables = consumables.len(),
            "loaded data set"
        );
        Ok(Self {
            yields,
            presets,
            exp: LevelTable::from_map(levels.exp),
            consumables,
            bonuses: levels.bonuses,
            planner,
        })
    }

    pub fn preset(&self, id: &str) -> Result<&CalculatorPreset, DataError> {
        self.presets
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| unknown("preset", id))
    }

    pub fn consumable(&self, id: &str) -> Result<&Consumable, DataError> {
        self.consumables
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| unknown("consumable", id))
    }

    pub fn bonus(&self, id: &str) -> Result<&BonusPreset, DataError> {
        self.bonuses
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| unknown("bonus", id))
    }
}

fn unknown(kind: &'static str, id: &str) -> DataError {
    DataError::Unknown {
        kind,
        id: id.to_string(),
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DataError> {
    let text = fs::read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(|e| DataError::Parse {
        file: path.display().to_string(),
        msg: e.to_string(),
    })
}

/// Read a list of sources, e.g. a user's saved toggles.
pub fn load_sources(path: &Path) -> Result<Vec<ResourceSource>, DataError> {
    let sources: Vec<ResourceSource> = read_yaml(path)?;
    for s in &sources {
        validate_source(s)?;
    }
    Ok(sources)
}

fn load_presets(dir: &Path, yields: &YieldTable) -> Result<Vec<CalculatorPreset>, DataError> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for ent in fs::read_dir(dir)? {
        let path = ent?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut presets: Vec<CalculatorPreset> = Vec::with_capacity(paths.len());
    for path in paths {
        let preset: CalculatorPreset = read_yaml(&path)?;
        preset.ladder()?;
        for s in &preset.sources {
            validate_source(s)?;
            if yields.base_yield(&s.origin, s.difficulty).is_none() {
                warn!(
                    preset = %preset.id,
                    source = %s.id.0,
                    difficulty = ?s.difficulty,
                    available = ?yields.tiers(&s.origin),
                    "preset source has no yield row"
                );
            }
        }
        if presets.iter().any(|p| p.id == preset.id) {
            return Err(DataError::Invalid(format!("duplicate preset id {}", preset.id)));
        }
        presets.push(preset);
    }
    Ok(presets)
}
