#![deny(warnings)]

//! Period accumulation and threshold ladder projection.
//!
//! This crate provides the shared engine behind the boss-clear and
//! daily-mission calculators:
//! - Total yield per period from a set of togglable resource sources
//! - Period-by-period projection of every stage of a threshold ladder
//! - A calculator wrapper parameterized per calculator variant

mod accumulator;
mod projector;

pub use accumulator::{compute_period_yield, source_yield, split_round_half_up, PeriodYield};
pub use projector::{
    project_ladder, project_ladder_with, MonthBoundary, ProjectionConfig, StageProjection,
    StageStatus,
};

use calc_core::{ProgressionState, ResourceSource, ThresholdLadder, YieldTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Full result of one ladder calculator pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderReport {
    /// Accumulated yield the projection ran with.
    pub yields: PeriodYield,
    /// One entry per threshold, in ladder order.
    pub stages: Vec<StageProjection>,
    /// Amount still missing to the final threshold.
    pub remaining: u64,
}

impl LadderReport {
    /// Projection of the final threshold.
    pub fn final_stage(&self) -> Option<&StageProjection> {
        self.stages.last()
    }

    /// Date the whole ladder completes, if it is projected to.
    pub fn completion_date(&self) -> Option<NaiveDate> {
        self.final_stage().and_then(|s| s.completion_date)
    }

    /// Whether every stage is already completed.
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// One calculator variant: a ladder plus the projection policy it runs with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderCalculator {
    pub ladder: ThresholdLadder,
    #[serde(default)]
    pub config: ProjectionConfig,
}

impl LadderCalculator {
    pub fn new(ladder: ThresholdLadder, config: ProjectionConfig) -> Self {
        Self { ladder, config }
    }

    /// Accumulate the sources and project every stage from `state`.
    pub fn run(
        &self,
        sources: &[ResourceSource],
        table: &YieldTable,
        state: &ProgressionState,
    ) -> LadderReport {
        let yields = compute_period_yield(sources, table);
        let stages = project_ladder_with(
            &self.ladder,
            yields,
            state.current_cumulative,
            state.start_date,
            &self.config,
        );
        let remaining = self.ladder.max().saturating_sub(state.current_cumulative);
        debug!(
            weekly = yields.weekly,
            monthly = yields.monthly,
            remaining,
            "ladder calculator run"
        );
        LadderReport {
            yields,
            stages,
            remaining,
        }
    }
}
