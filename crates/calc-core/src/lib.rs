#![deny(warnings)]

//! Core domain models and invariants for the MapleStory progression calculators.
//!
//! This crate defines the serializable inputs consumed by the calculation
//! engines (resource sources, yield tables, threshold ladders, level curves)
//! together with validation helpers that guard their invariants at the
//! input boundary.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Stable key of a configured resource source, e.g. "lotus-hard".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

/// Key into the static yield table, e.g. "lotus" or "black_mage".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginId(pub String);

/// Difficulty tier of a source. Not every origin exposes every tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Chaos,
    Extreme,
}

/// Which accumulation bucket a source feeds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Periodicity {
    /// Collected every day; counts seven times toward the weekly bucket.
    Daily,
    /// Collected once per 7-day period.
    #[default]
    Weekly,
    /// Collected at most once per calendar month.
    Monthly,
}

/// Flat multiplier toggled outside the source itself (e.g. a pass item).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusMultiplier {
    /// Flat factor, 1 when no bonus item is active.
    #[serde(default = "one")]
    pub factor: u32,
    /// Doubling flag, applied again in every period.
    #[serde(default)]
    pub doubled: bool,
}

fn one() -> u32 {
    1
}

impl Default for BonusMultiplier {
    fn default() -> Self {
        Self {
            factor: 1,
            doubled: false,
        }
    }
}

impl BonusMultiplier {
    /// Combined multiplier applied to the base yield.
    pub fn effective(&self) -> u64 {
        let doubling = if self.doubled { 2 } else { 1 };
        u64::from(self.factor) * doubling
    }
}

fn default_participants() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// One configurable yield generator: a boss at a difficulty, or a daily task slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSource {
    /// Stable key of this source within a calculator.
    pub id: SourceId,
    /// Row key into the yield table.
    pub origin: OriginId,
    /// Selected tier; `None` for origins with a single tier.
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// Party size the reward is split across (>= 1).
    #[serde(default = "default_participants")]
    pub participants: u32,
    /// Disabled sources contribute nothing.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Accumulation bucket.
    #[serde(default)]
    pub periodicity: Periodicity,
    /// Externally toggled bonus.
    #[serde(default)]
    pub bonus: BonusMultiplier,
}

impl ResourceSource {
    /// Enabled solo source without any bonus.
    pub fn new(
        id: &str,
        origin: &str,
        difficulty: Option<Difficulty>,
        periodicity: Periodicity,
    ) -> Self {
        Self {
            id: SourceId(id.to_string()),
            origin: OriginId(origin.to_string()),
            difficulty,
            participants: 1,
            enabled: true,
            periodicity,
            bonus: BonusMultiplier::default(),
        }
    }

    pub fn with_participants(mut self, participants: u32) -> Self {
        self.participants = participants;
        self
    }

    pub fn with_bonus(mut self, bonus: BonusMultiplier) -> Self {
        self.bonus = bonus;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Row of the static yield table as stored on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldRow {
    pub origin: OriginId,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    pub amount: u64,
}

/// Read-only mapping `(origin, difficulty) -> base yield`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct YieldTable {
    rows: BTreeMap<(OriginId, Option<Difficulty>), u64>,
}

impl YieldTable {
    /// Build a table, rejecting duplicate `(origin, difficulty)` keys.
    pub fn from_rows<I>(rows: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = YieldRow>,
    {
        let mut table = Self::default();
        for row in rows {
            let key = describe_key(&row.origin, row.difficulty);
            if table.insert(row.origin, row.difficulty, row.amount).is_some() {
                return Err(ValidationError::DuplicateYieldRow(key));
            }
        }
        Ok(table)
    }

    /// Insert or replace a row, returning the previous amount.
    pub fn insert(
        &mut self,
        origin: OriginId,
        difficulty: Option<Difficulty>,
        amount: u64,
    ) -> Option<u64> {
        self.rows.insert((origin, difficulty), amount)
    }

    /// Base yield for a configuration, `None` when the table has no such row.
    pub fn base_yield(&self, origin: &OriginId, difficulty: Option<Difficulty>) -> Option<u64> {
        self.rows.get(&(origin.clone(), difficulty)).copied()
    }

    /// Tiers available for an origin, in ascending order.
    pub fn tiers(&self, origin: &OriginId) -> Vec<Option<Difficulty>> {
        self.rows
            .keys()
            .filter(|(o, _)| o == origin)
            .map(|(_, d)| *d)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn describe_key(origin: &OriginId, difficulty: Option<Difficulty>) -> String {
    match difficulty {
        Some(d) => format!("{}/{:?}", origin.0, d),
        None => origin.0.clone(),
    }
}

/// One rung of a ladder: the span between the previous threshold and this one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stage {
    /// Zero-based position in the ladder.
    pub index: usize,
    /// Previous threshold, 0 for the first stage.
    pub floor: u64,
    /// Cumulative amount that completes this stage.
    pub threshold: u64,
}

impl Stage {
    /// Amount needed to go from `floor` to `threshold`.
    pub fn required(&self) -> u64 {
        self.threshold - self.floor
    }
}

/// Ordered, strictly increasing cumulative thresholds. The last one means
/// "fully progressed".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct ThresholdLadder {
    thresholds: Vec<u64>,
}

impl ThresholdLadder {
    pub fn new(thresholds: Vec<u64>) -> Result<Self, ValidationError> {
        if thresholds.is_empty() {
            return Err(ValidationError::EmptyLadder);
        }
        for (index, pair) in thresholds.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(ValidationError::LadderNotIncreasing {
                    index: index + 1,
                    previous: pair[0],
                    value: pair[1],
                });
            }
        }
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &[u64] {
        &self.thresholds
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Final threshold: the fully progressed amount.
    pub fn max(&self) -> u64 {
        self.thresholds.last().copied().unwrap_or(0)
    }

    /// Iterate stages with their floors.
    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.thresholds
            .iter()
            .enumerate()
            .map(move |(index, &threshold)| Stage {
                index,
                floor: if index == 0 {
                    0
                } else {
                    self.thresholds[index - 1]
                },
                threshold,
            })
    }
}

impl TryFrom<Vec<u64>> for ThresholdLadder {
    type Error = ValidationError;

    fn try_from(value: Vec<u64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ThresholdLadder> for Vec<u64> {
    fn from(ladder: ThresholdLadder) -> Self {
        ladder.thresholds
    }
}

/// Snapshot of a ladder calculator's user input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionState {
    /// First collection date of the projection.
    pub start_date: NaiveDate,
    /// Amount already accumulated.
    pub current_cumulative: u64,
}

/// Current level and progress within it, in percent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelState {
    pub level: u32,
    /// Progress toward the next level in [0, 100].
    pub progress_pct: Decimal,
}

impl LevelState {
    pub fn new(level: u32, progress_pct: Decimal) -> Result<Self, ValidationError> {
        let state = Self {
            level,
            progress_pct,
        };
        validate_level_state(&state)?;
        Ok(state)
    }

    /// Level start with no progress.
    pub fn at(level: u32) -> Self {
        Self {
            level,
            progress_pct: Decimal::ZERO,
        }
    }
}

/// Inclusive level bracket sharing one value, as stored on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBracket {
    pub from: u32,
    pub to: u32,
    pub amount: u64,
}

/// Mapping `level -> amount`, used both as the EXP cost curve and as
/// consumable yield curves. Levels without a row read as 0.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelTable {
    rows: BTreeMap<u32, u64>,
}

impl LevelTable {
    pub fn from_map(rows: BTreeMap<u32, u64>) -> Self {
        Self { rows }
    }

    /// Expand brackets into per-level rows. Brackets must not overlap.
    pub fn from_brackets(brackets: &[LevelBracket]) -> Result<Self, ValidationError> {
        let mut rows = BTreeMap::new();
        for b in brackets {
            if b.from > b.to {
                return Err(ValidationError::InvertedBracket {
                    from: b.from,
                    to: b.to,
                });
            }
            for level in b.from..=b.to {
                if rows.insert(level, b.amount).is_some() {
                    return Err(ValidationError::DuplicateLevel(level));
                }
            }
        }
        Ok(Self { rows })
    }

    /// Value at `level`, 0 when undefined.
    pub fn get(&self, level: u32) -> u64 {
        self.rows.get(&level).copied().unwrap_or(0)
    }

    pub fn insert(&mut self, level: u32, amount: u64) -> Option<u64> {
        self.rows.insert(level, amount)
    }

    /// Lowest and highest defined levels.
    pub fn span(&self) -> Option<(u32, u32)> {
        let first = self.rows.keys().next()?;
        let last = self.rows.keys().next_back()?;
        Some((*first, *last))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Level-skip modifier: each level-up grants `skip` extra levels until `ceiling`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusRule {
    pub skip: u32,
    pub ceiling: u32,
}

impl BonusRule {
    /// Extra levels granted when leaving `level`, clipped so the ceiling is
    /// landed on exactly. Zero at or above the ceiling.
    pub fn effective_skip(&self, level: u32) -> u32 {
        if level >= self.ceiling {
            return 0;
        }
        if level.saturating_add(1).saturating_add(self.skip) > self.ceiling {
            self.ceiling - level - 1
        } else {
            self.skip
        }
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A ladder needs at least one threshold.
    #[error("threshold ladder is empty")]
    EmptyLadder,
    /// Thresholds must be strictly increasing.
    #[error("threshold #{index} ({value}) does not exceed the previous one ({previous})")]
    LadderNotIncreasing {
        index: usize,
        previous: u64,
        value: u64,
    },
    /// Level progress is a percentage.
    #[error("level progress {0}% is outside [0, 100]")]
    ProgressOutOfRange(Decimal),
    /// Rewards cannot be split across zero players.
    #[error("source {0} has zero participants")]
    ZeroParticipants(String),
    /// Source ids must be non-empty.
    #[error("source id is empty")]
    EmptySourceId,
    /// The same `(origin, difficulty)` appears twice.
    #[error("duplicate yield row: {0}")]
    DuplicateYieldRow(String),
    /// Two level brackets cover the same level.
    #[error("level {0} is defined more than once")]
    DuplicateLevel(u32),
    /// Bracket bounds are reversed.
    #[error("level bracket {from}..={to} is inverted")]
    InvertedBracket { from: u32, to: u32 },
}

/// Validate a resource source as entered by the user.
pub fn validate_source(s: &ResourceSource) -> Result<(), ValidationError> {
    if s.id.0.trim().is_empty() {
        return Err(ValidationError::EmptySourceId);
    }
    if s.participants == 0 {
        return Err(ValidationError::ZeroParticipants(s.id.0.clone()));
    }
    Ok(())
}

/// Validate a level state.
pub fn validate_level_state(s: &LevelState) -> Result<(), ValidationError> {
    if s.progress_pct < Decimal::ZERO || s.progress_pct > Decimal::ONE_HUNDRED {
        return Err(ValidationError::ProgressOutOfRange(s.progress_pct));
    }
    Ok(())
}
