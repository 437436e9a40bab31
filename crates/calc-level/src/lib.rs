#![deny(warnings)]

//! Consumable-driven level-up simulation.
//!
//! Both modes walk the EXP curve one level at a time:
//! - `to_level`: consumables needed to reach a target level
//! - `with_budget`: level reached after spending a fixed number of consumables
//!
//! A level whose cost or per-unit yield is undefined (0) ends the walk; an
//! iteration cap bounds runaway configurations.

use calc_core::{BonusRule, LevelState, LevelTable};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default bound on simulated level steps.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100_000;

/// One level step (or a partial step when `from == to`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRange {
    pub from: u32,
    pub to: u32,
    /// Consumables spent on this step.
    pub consumed: u64,
    /// EXP granted by those consumables.
    pub gained: u64,
}

/// Why a simulation stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SimHalt {
    /// Target level reached.
    Reached,
    /// Budget fully spent.
    BudgetSpent,
    /// Cost or yield undefined at `level`.
    CurveExhausted { level: u32 },
    /// Safety bound hit.
    IterationCap,
}

/// Result of a target-level simulation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResult {
    /// Total consumables needed.
    pub consumed: u64,
    /// Total EXP granted.
    pub gained: u64,
    /// Level the walk ended on; at least the target unless halted early.
    pub final_level: u32,
    pub details: Vec<LevelRange>,
    pub halt: SimHalt,
}

/// Result of a fixed-budget simulation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetResult {
    pub final_level: u32,
    /// Progress within `final_level`, in percent.
    pub final_progress_pct: Decimal,
    /// Consumables left over when the walk halted before spending them.
    pub unused: u64,
    pub details: Vec<LevelRange>,
    pub halt: SimHalt,
}

impl BudgetResult {
    pub fn consumed(&self) -> u64 {
        self.details.iter().map(|r| r.consumed).sum()
    }

    pub fn gained(&self) -> u64 {
        self.details.iter().map(|r| r.gained).sum()
    }
}

/// Units needed to finish the current level.
#[derive(Clone, Copy, Debug)]
struct Step {
    cost: u64,
    per_unit: u64,
    units: u64,
}

/// Level-up simulator over an EXP cost curve and a consumable yield curve.
#[derive(Clone, Debug)]
pub struct LevelSimulator<'a> {
    cost: &'a LevelTable,
    yields: &'a LevelTable,
    bonus: Option<BonusRule>,
    max_iterations: u32,
}

impl<'a> LevelSimulator<'a> {
    pub fn new(cost: &'a LevelTable, yields: &'a LevelTable) -> Self {
        Self {
            cost,
            yields,
            bonus: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_bonus(mut self, bonus: Option<BonusRule>) -> Self {
        self.bonus = bonus;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn step(&self, level: u32, progress_pct: Decimal) -> Result<Step, SimHalt> {
        let cost = self.cost.get(level);
        let per_unit = self.yields.get(level);
        if cost == 0 || per_unit == 0 {
            return Err(SimHalt::CurveExhausted { level });
        }
        let left = (Decimal::ONE_HUNDRED - progress_pct).max(Decimal::ZERO);
        let remaining = Decimal::from(cost) * left / Decimal::ONE_HUNDRED;
        let units = (remaining / Decimal::from(per_unit))
            .ceil()
            .to_u64()
            .unwrap_or(u64::MAX);
        Ok(Step {
            cost,
            per_unit,
            units,
        })
    }

    fn next_level(&self, level: u32) -> u32 {
        let skip = self.bonus.map_or(0, |b| b.effective_skip(level));
        level.saturating_add(1).saturating_add(skip)
    }

    /// Consumables needed to go from `start` to `target`.
    pub fn to_level(&self, start: &LevelState, target: u32) -> TargetResult {
        let mut level = start.level;
        let mut progress = start.progress_pct;
        let mut details = Vec::new();
        let mut consumed: u64 = 0;
        let mut gained: u64 = 0;
        let mut halt = SimHalt::Reached;
        let mut iterations = 0;

        while level < target {
            if iterations >= self.max_iterations {
                warn!(level, iterations, "level simulation hit iteration cap");
                halt = SimHalt::IterationCap;
                break;
            }
            iterations += 1;
            let step = match self.step(level, progress) {
                Ok(step) => step,
                Err(h) => {
                    halt = h;
                    break;
                }
            };
            let to = self.next_level(level);
            let granted = step.units.saturating_mul(step.per_unit);
            details.push(LevelRange {
                from: level,
                to,
                consumed: step.units,
                gained: granted,
            });
            consumed = consumed.saturating_add(step.units);
            gained = gained.saturating_add(granted);
            level = to;
            progress = Decimal::ZERO;
        }

        debug!(
            from = start.level,
            target,
            final_level = level,
            consumed,
            ?halt,
            "target simulation finished"
        );
        TargetResult {
            consumed,
            gained,
            final_level: level,
            details,
            halt,
        }
    }

    /// Level reached after spending at most `budget` consumables from `start`.
    pub fn with_budget(&self, start: &LevelState, budget: u64) -> BudgetResult {
        let mut level = start.level;
        let mut progress = start.progress_pct;
        let mut left = budget;
        let mut details = Vec::new();
        let mut iterations = 0;

        let halt = loop {
            if iterations >= self.max_iterations {
                warn!(level, iterations, "level simulation hit iteration cap");
                break SimHalt::IterationCap;
            }
            if left == 0 {
                break SimHalt::BudgetSpent;
            }
            iterations += 1;
            let step = match self.step(level, progress) {
                Ok(step) => step,
                Err(h) => break h,
            };
            if left >= step.units {
                let to = self.next_level(level);
                details.push(LevelRange {
                    from: level,
                    to,
                    consumed: step.units,
                    gained: step.units.saturating_mul(step.per_unit),
                });
                left -= step.units;
                level = to;
                progress = Decimal::ZERO;
                continue;
            }
            // not enough for a level-up: spend the rest as partial progress
            let granted = left.saturating_mul(step.per_unit);
            progress += Decimal::from(granted) * Decimal::ONE_HUNDRED / Decimal::from(step.cost);
            details.push(LevelRange {
                from: level,
                to: level,
                consumed: left,
                gained: granted,
            });
            left = 0;
            break SimHalt::BudgetSpent;
        };

        debug!(
            from = start.level,
            budget,
            final_level = level,
            unused = left,
            ?halt,
            "budget simulation finished"
        );
        BudgetResult {
            final_level: level,
            final_progress_pct: progress,
            unused: left,
            details,
            halt,
        }
    }
}

/// Mode A: consumables needed to reach `target`.
pub fn simulate_to_level(
    start: &LevelState,
    target: u32,
    cost: &LevelTable,
    yields: &LevelTable,
    bonus: Option<BonusRule>,
) -> TargetResult {
    LevelSimulator::new(cost, yields)
        .with_bonus(bonus)
        .to_level(start, target)
}

/// Mode B: level reached after spending `budget` consumables.
pub fn simulate_with_budget(
    start: &LevelState,
    budget: u64,
    cost: &LevelTable,
    yields: &LevelTable,
    bonus: Option<BonusRule>,
) -> BudgetResult {
    LevelSimulator::new(cost, yields)
        .with_bonus(bonus)
        .with_budget(start, budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calc_core::LevelBracket;
    use proptest::prelude::*;

    fn flat(from: u32, to: u32, amount: u64) -> LevelTable {
        LevelTable::from_brackets(&[LevelBracket { from, to, amount }]).unwrap()
    }

    fn curves() -> (LevelTable, LevelTable) {
        (flat(250, 270, 1000), flat(250, 270, 300))
    }

    const BURNING: BonusRule = BonusRule {
        skip: 4,
        ceiling: 260,
    };

    #[test]
    fn to_level_counts_partial_first_level() {
        let (cost, yields) = curves();
        let start = LevelState::new(250, Decimal::from(50)).unwrap();
        let r = simulate_to_level(&start, 253, &cost, &yields, None);
        // 500 left -> 2, then 4 + 4
        assert_eq!(r.consumed, 10);
        assert_eq!(r.gained, 3000);
        assert_eq!(r.final_level, 253);
        assert_eq!(r.halt, SimHalt::Reached);
        assert_eq!(
            r.details.iter().map(|d| d.consumed).collect::<Vec<_>>(),
            vec![2, 4, 4]
        );
    }

    #[test]
    fn already_at_target_needs_nothing() {
        let (cost, yields) = curves();
        let r = simulate_to_level(&LevelState::at(260), 255, &cost, &yields, None);
        assert_eq!(r.consumed, 0);
        assert!(r.details.is_empty());
        assert_eq!(r.halt, SimHalt::Reached);
    }

    #[test]
    fn bonus_skips_levels_until_ceiling() {
        let (cost, yields) = curves();
        let r = simulate_to_level(&LevelState::at(250), 262, &cost, &yields, Some(BURNING));
        let hops: Vec<(u32, u32)> = r.details.iter().map(|d| (d.from, d.to)).collect();
        assert_eq!(hops, vec![(250, 255), (255, 260), (260, 261), (261, 262)]);
        assert_eq!(r.consumed, 16);
    }

    #[test]
    fn bonus_clips_to_ceiling_then_stops() {
        let (cost, yields) = curves();
        let r = simulate_to_level(&LevelState::at(258), 261, &cost, &yields, Some(BURNING));
        assert_eq!(r.details[0].from, 258);
        assert_eq!(r.details[0].to, 260);
        assert_eq!(r.details[1].from, 260);
        assert_eq!(r.details[1].to, 261);
        assert_eq!(r.final_level, 261);
    }

    #[test]
    fn undefined_curve_halts() {
        let (cost, yields) = curves();
        let r = simulate_to_level(&LevelState::at(268), 275, &cost, &yields, None);
        assert_eq!(r.halt, SimHalt::CurveExhausted { level: 271 });
        assert_eq!(r.final_level, 271);
        assert_eq!(r.consumed, 12);

        let mut gap = yields.clone();
        gap.insert(265, 0);
        let r = simulate_to_level(&LevelState::at(260), 270, &cost, &gap, None);
        assert_eq!(r.halt, SimHalt::CurveExhausted { level: 265 });
        assert_eq!(r.details.len(), 5);
    }

    #[test]
    fn iteration_cap_bounds_walk() {
        let (cost, yields) = curves();
        let r = LevelSimulator::new(&cost, &yields)
            .with_max_iterations(3)
            .to_level(&LevelState::at(250), 270);
        assert_eq!(r.halt, SimHalt::IterationCap);
        assert_eq!(r.details.len(), 3);
    }

    #[test]
    fn budget_leaves_partial_progress() {
        let (cost, yields) = curves();
        let r = simulate_with_budget(&LevelState::at(250), 10, &cost, &yields, None);
        assert_eq!(r.final_level, 252);
        assert_eq!(r.final_progress_pct, Decimal::from(60));
        assert_eq!(r.unused, 0);
        assert_eq!(r.halt, SimHalt::BudgetSpent);
        let last = r.details.last().unwrap();
        assert_eq!((last.from, last.to, last.consumed), (252, 252, 2));
        assert_eq!(r.consumed(), 10);
    }

    #[test]
    fn exact_budget_lands_on_level_start() {
        let (cost, yields) = curves();
        let r = simulate_with_budget(&LevelState::at(250), 8, &cost, &yields, None);
        assert_eq!(r.final_level, 252);
        assert_eq!(r.final_progress_pct, Decimal::ZERO);
        assert_eq!(r.details.len(), 2);
    }

    #[test]
    fn budget_beyond_curve_reports_unused() {
        let (cost, yields) = curves();
        let r = simulate_with_budget(&LevelState::at(250), 1_000, &cost, &yields, Some(BURNING));
        assert_eq!(r.halt, SimHalt::CurveExhausted { level: 271 });
        assert_eq!(r.final_level, 271);
        assert_eq!(r.consumed() + r.unused, 1_000);
    }

    #[test]
    fn zero_budget_changes_nothing() {
        let (cost, yields) = curves();
        let start = LevelState::new(255, Decimal::new(125, 1)).unwrap();
        let r = simulate_with_budget(&start, 0, &cost, &yields, None);
        assert_eq!(r.final_level, 255);
        assert_eq!(r.final_progress_pct, Decimal::new(125, 1));
        assert!(r.details.is_empty());
    }

    proptest! {
        #[test]
        fn target_details_reconcile(start in 240u32..275, target in 240u32..280,
                                    pct in 0i64..1000, skip in 0u32..5, bonus_on in any::<bool>()) {
            let cost = flat(240, 272, 7_777);
            let yields = flat(240, 272, 321);
            let bonus = bonus_on.then_some(BonusRule { skip, ceiling: 260 });
            let state = LevelState::new(start, Decimal::new(pct, 1)).unwrap();
            let r = simulate_to_level(&state, target, &cost, &yields, bonus);
            prop_assert_eq!(r.details.iter().map(|d| d.consumed).sum::<u64>(), r.consumed);
            prop_assert_eq!(r.details.iter().map(|d| d.gained).sum::<u64>(), r.gained);
        }

        #[test]
        fn budget_details_reconcile(start in 240u32..275, budget in 0u64..2_000,
                                    pct in 0i64..1000, skip in 0u32..5) {
            let cost = flat(240, 272, 7_777);
            let yields = flat(240, 272, 321);
            let state = LevelState::new(start, Decimal::new(pct, 1)).unwrap();
            let r = simulate_with_budget(&state, budget, &cost, &yields, Some(BonusRule { skip, ceiling: 260 }));
            prop_assert_eq!(r.consumed() + r.unused, budget);
            prop_assert!(r.final_progress_pct < Decimal::ONE_HUNDRED);
        }
    }
}
