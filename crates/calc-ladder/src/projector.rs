//! Threshold ladder projector.
//!
//! Every stage is projected independently from the true start state. A
//! period is one 7-day step; the weekly yield is credited every period and
//! the monthly yield at most once per calendar month.

use crate::accumulator::PeriodYield;
use calc_core::ThresholdLadder;
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const PERIOD_DAYS: u64 = 7;

/// Which calendar month a period's monthly credit belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthBoundary {
    /// Month of the collection date itself.
    #[default]
    CollectionDate,
    /// Month of the last day of the 7-day window starting at the collection date.
    WindowEnd,
}

impl MonthBoundary {
    fn month_of(self, collected: NaiveDate) -> Option<(i32, u32)> {
        let day = match self {
            MonthBoundary::CollectionDate => collected,
            MonthBoundary::WindowEnd => collected.checked_add_days(Days::new(PERIOD_DAYS - 1))?,
        };
        Some((day.year(), day.month()))
    }
}

/// Per-variant projection policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    #[serde(default)]
    pub month_boundary: MonthBoundary,
    /// The monthly source was already collected in the start date's month.
    #[serde(default)]
    pub monthly_claimed_at_start: bool,
    /// Optional bound on periods per stage. Unbounded by default: any
    /// non-zero yield reaches every threshold before the calendar overflows.
    #[serde(default)]
    pub max_periods: Option<u32>,
}

/// Outcome class of one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Start cumulative already meets the threshold.
    Completed,
    /// Completes after `periods` periods.
    Projected,
    /// Never completes with the current yield.
    Unreachable,
}

/// Projection of one ladder threshold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProjection {
    /// Zero-based stage index.
    pub stage: usize,
    /// Cumulative threshold of this stage.
    pub threshold: u64,
    /// Amount between the previous threshold and this one.
    pub required: u64,
    /// Amount already collected within this stage, at most `required`.
    pub progress: u64,
    pub status: StageStatus,
    /// Periods until completion; 0 unless `Projected`.
    pub periods: u32,
    /// Collection date of the completing period.
    pub completion_date: Option<NaiveDate>,
}

impl StageProjection {
    /// Display value for the completion column.
    pub fn date_label(&self) -> String {
        match (self.status, self.completion_date) {
            (StageStatus::Completed, _) => "completed".to_string(),
            (StageStatus::Projected, Some(date)) => date.to_string(),
            _ => "—".to_string(),
        }
    }

    /// Amount still missing within this stage.
    pub fn missing(&self) -> u64 {
        self.required - self.progress
    }
}

/// Project every threshold with the default policy.
pub fn project_ladder(
    ladder: &ThresholdLadder,
    yields: PeriodYield,
    start_cumulative: u64,
    start_date: NaiveDate,
) -> Vec<StageProjection> {
    project_ladder_with(
        ladder,
        yields,
        start_cumulative,
        start_date,
        &ProjectionConfig::default(),
    )
}

/// Project every threshold under an explicit policy.
pub fn project_ladder_with(
    ladder: &ThresholdLadder,
    yields: PeriodYield,
    start_cumulative: u64,
    start_date: NaiveDate,
    config: &ProjectionConfig,
) -> Vec<StageProjection> {
    ladder
        .stages()
        .map(|stage| {
            let required = stage.required();
            let progress = start_cumulative.saturating_sub(stage.floor).min(required);
            let (status, periods, completion_date) = if start_cumulative >= stage.threshold {
                (StageStatus::Completed, 0, None)
            } else if yields.is_zero() {
                (StageStatus::Unreachable, 0, None)
            } else {
                match periods_to_reach(
                    stage.threshold,
                    yields,
                    start_cumulative,
                    start_date,
                    config,
                ) {
                    Some((periods, date)) => (StageStatus::Projected, periods, Some(date)),
                    None => {
                        warn!(
                            stage = stage.index,
                            threshold = stage.threshold,
                            max_periods = ?config.max_periods,
                            "projection exceeded period cap or calendar range"
                        );
                        (StageStatus::Unreachable, 0, None)
                    }
                }
            };
            debug!(stage = stage.index, ?status, periods, "stage projected");
            StageProjection {
                stage: stage.index,
                threshold: stage.threshold,
                required,
                progress,
                status,
                periods,
                completion_date,
            }
        })
        .collect()
}

/// Periods needed to reach `target`, with the collection date of the last
/// one. `None` when the cap is hit or the calendar overflows.
fn periods_to_reach(
    target: u64,
    yields: PeriodYield,
    start_cumulative: u64,
    start_date: NaiveDate,
    config: &ProjectionConfig,
) -> Option<(u32, NaiveDate)> {
    let found = if yields.monthly == 0 {
        weekly_only(target, yields.weekly, start_cumulative, start_date)
    } else {
        walk_periods(target, yields, start_cumulative, start_date, config)
    }?;
    match config.max_periods {
        Some(cap) if found.0 > cap => None,
        _ => Some(found),
    }
}

/// Closed form for a weekly yield alone: `ceil(missing / weekly)` periods.
fn weekly_only(
    target: u64,
    weekly: u64,
    start_cumulative: u64,
    start_date: NaiveDate,
) -> Option<(u32, NaiveDate)> {
    if weekly == 0 {
        return None;
    }
    let missing = target.saturating_sub(start_cumulative);
    let periods = u32::try_from(missing.div_ceil(weekly).max(1)).ok()?;
    let offset = u64::from(periods - 1) * PERIOD_DAYS;
    Some((periods, start_date.checked_add_days(Days::new(offset))?))
}

/// Walk period by period, crediting the monthly yield once per calendar month.
fn walk_periods(
    target: u64,
    yields: PeriodYield,
    start_cumulative: u64,
    start_date: NaiveDate,
    config: &ProjectionConfig,
) -> Option<(u32, NaiveDate)> {
    let mut cumulative = start_cumulative;
    let mut date = start_date;
    let mut credited_month = if config.monthly_claimed_at_start {
        Some((start_date.year(), start_date.month()))
    } else {
        None
    };
    let mut period: u32 = 0;
    loop {
        period = period.checked_add(1)?;
        if config.max_periods.is_some_and(|cap| period > cap) {
            return None;
        }
        cumulative = cumulative.saturating_add(yields.weekly);
        if yields.monthly > 0 {
            let month = config.month_boundary.month_of(date)?;
            if credited_month != Some(month) {
                cumulative = cumulative.saturating_add(yields.monthly);
                credited_month = Some(month);
            }
        }
        if cumulative >= target {
            return Some((period, date));
        }
        date = date.checked_add_days(Days::new(PERIOD_DAYS))?;
    }
}
