#![deny(warnings)]

//! Headless front end for the progression calculators.

use anyhow::{anyhow, bail, Context, Result};
use calc_core::{BonusMultiplier, LevelState, Periodicity, ProgressionState, ResourceSource};
use calc_data::{load_sources, CalculatorPreset, DataSet, PlannerConfig};
use calc_ladder::{source_yield, LadderReport, StageStatus};
use calc_level::{LevelRange, LevelSimulator, SimHalt};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  maple-calc presets
  maple-calc ladder --preset <id> [--sources <file>] [--start <YYYY-MM-DD>] [--current <n>]
                    [--factor <n>] [--double] [--claimed]
  maple-calc level --from <lvl> [--progress <pct>] (--to <lvl> | --budget <n>)
                   --consumable <id> [--bonus <id>]
common flags: --assets <dir> (or MAPLE_CALC_ASSETS), --config <file>, --json
--start defaults to today in the local time zone.
--factor/--double apply to weekly sources only; daily and monthly sources keep
their own bonus.";

#[derive(Debug, Default)]
struct Args {
    command: Option<String>,
    assets: Option<PathBuf>,
    config: Option<PathBuf>,
    json: bool,
    preset: Option<String>,
    sources: Option<PathBuf>,
    start: Option<NaiveDate>,
    current: Option<u64>,
    factor: Option<u32>,
    double: bool,
    claimed: bool,
    from: Option<u32>,
    progress: Option<Decimal>,
    to: Option<u32>,
    budget: Option<u64>,
    consumable: Option<String>,
    bonus: Option<String>,
}

fn value<T>(flag: &str, raw: Option<String>) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = raw.ok_or_else(|| anyhow!("{flag} needs a value"))?;
    raw.parse()
        .map_err(|e| anyhow!("invalid value for {flag}: {raw} ({e})"))
}

fn parse_args<I: Iterator<Item = String>>(mut it: I) -> Result<Args> {
    let mut args = Args::default();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--assets" => args.assets = Some(value(&arg, it.next())?),
            "--config" => args.config = Some(value(&arg, it.next())?),
            "--json" => args.json = true,
            "--preset" => args.preset = Some(value(&arg, it.next())?),
            "--sources" => args.sources = Some(value(&arg, it.next())?),
            "--start" => args.start = Some(value(&arg, it.next())?),
            "--current" => args.current = Some(value(&arg, it.next())?),
            "--factor" => args.factor = Some(value(&arg, it.next())?),
            "--double" => args.double = true,
            "--claimed" => args.claimed = true,
            "--from" => args.from = Some(value(&arg, it.next())?),
            "--progress" => {
                let p: Decimal = value(&arg, it.next())?;
                args.progress = Some(p.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED));
            }
            "--to" => args.to = Some(value(&arg, it.next())?),
            "--budget" => args.budget = Some(value(&arg, it.next())?),
            "--consumable" => args.consumable = Some(value(&arg, it.next())?),
            "--bonus" => args.bonus = Some(value(&arg, it.next())?),
            "-h" | "--help" => args.command = Some("help".to_string()),
            other if other.starts_with("--") => bail!("unknown flag {other}"),
            other => {
                if args.command.is_some() {
                    bail!("unexpected argument {other}");
                }
                args.command = Some(other.to_string());
            }
        }
    }
    Ok(args)
}

/// Calendar date of `now` in its own time zone.
fn local_date<Tz: TimeZone>(now: DateTime<Tz>) -> NaiveDate {
    now.date_naive()
}

fn today() -> NaiveDate {
    local_date(Local::now())
}

/// Apply the boss-pass bonus to every weekly source.
fn apply_pass(sources: &mut [ResourceSource], bonus: BonusMultiplier) {
    for s in sources
        .iter_mut()
        .filter(|s| s.periodicity == Periodicity::Weekly)
    {
        s.bonus = bonus;
    }
}

fn run_presets(data: &DataSet) -> Result<()> {
    println!("ladder presets:");
    for p in &data.presets {
        println!(
            "  {:<10} {} ({} stages, {} {})",
            p.id,
            p.title,
            p.stages.len(),
            p.ladder()?.max(),
            p.unit
        );
    }
    println!("consumables:");
    for c in &data.consumables {
        let span = c
            .yields
            .span()
            .map_or("-".to_string(), |(lo, hi)| format!("Lv.{lo}-{hi}"));
        println!("  {:<12} {} [{}]", c.id, c.name, span);
    }
    println!("level bonuses:");
    for b in &data.bonuses {
        println!(
            "  {:<12} {} (+{} until Lv.{})",
            b.id, b.name, b.rule.skip, b.rule.ceiling
        );
    }
    Ok(())
}

fn run_ladder(data: &DataSet, args: &Args) -> Result<()> {
    let id = args.preset.as_deref().context("--preset is required")?;
    let preset = data.preset(id)?;
    let mut sources = match &args.sources {
        Some(path) => load_sources(path)?,
        None => preset.sources.clone(),
    };
    if args.factor.is_some() || args.double {
        let bonus = BonusMultiplier {
            factor: args.factor.unwrap_or(1),
            doubled: args.double,
        };
        apply_pass(&mut sources, bonus);
    }
    let mut calc = preset.calculator(&data.planner)?;
    if args.claimed {
        calc.config.monthly_claimed_at_start = true;
    }
    let state = ProgressionState {
        start_date: args.start.unwrap_or_else(today),
        current_cumulative: args.current.unwrap_or(0),
    };
    let report = calc.run(&sources, &data.yields, &state);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_ladder(data, preset, &sources, &state, &report);
    }
    Ok(())
}

fn print_ladder(
    data: &DataSet,
    preset: &CalculatorPreset,
    sources: &[ResourceSource],
    state: &ProgressionState,
    report: &LadderReport,
) {
    println!(
        "{} | start: {} | current: {} {}",
        preset.title, state.start_date, state.current_cumulative, preset.unit
    );
    for s in sources.iter().filter(|s| s.enabled) {
        let difficulty = s
            .difficulty
            .map_or(String::new(), |d| format!("{d:?}").to_lowercase());
        println!(
            "  {:<16} {:<8} {:?} x{} /{} -> {}",
            s.id.0,
            difficulty,
            s.periodicity,
            s.bonus.effective(),
            s.participants,
            source_yield(s, &data.yields)
        );
    }
    println!(
        "yield | weekly: {} | monthly: {}",
        report.yields.weekly, report.yields.monthly
    );
    for stage in &report.stages {
        let periods = match stage.status {
            StageStatus::Projected => stage.periods.to_string(),
            _ => "-".to_string(),
        };
        println!(
            "{:>3}. {:<16} {:>7}/{:<7} {:>5}  {}",
            stage.stage + 1,
            preset.stage_name(stage.stage),
            stage.progress,
            stage.required,
            periods,
            stage.date_label()
        );
    }
    match report.completion_date() {
        Some(date) => println!("done: {date} | remaining: {}", report.remaining),
        None if report.is_complete() => println!("fully progressed"),
        None => println!(
            "cannot complete with current sources | remaining: {}",
            report.remaining
        ),
    }
}

fn describe_halt(halt: SimHalt) -> String {
    match halt {
        SimHalt::Reached => "target reached".to_string(),
        SimHalt::BudgetSpent => "budget spent".to_string(),
        SimHalt::CurveExhausted { level } => format!("no data for Lv.{level}"),
        SimHalt::IterationCap => "iteration cap hit".to_string(),
    }
}

fn print_details(details: &[LevelRange]) {
    for d in details {
        println!(
            "  Lv.{:<3} -> Lv.{:<3} x{:<6} +{} exp",
            d.from, d.to, d.consumed, d.gained
        );
    }
}

fn run_level(data: &DataSet, args: &Args) -> Result<()> {
    let from = args.from.context("--from is required")?;
    let start = LevelState::new(from, args.progress.unwrap_or(Decimal::ZERO))?;
    let consumable_id = args
        .consumable
        .as_deref()
        .context("--consumable is required")?;
    let consumable = data.consumable(consumable_id)?;
    let bonus = match args.bonus.as_deref() {
        Some(id) => Some(data.bonus(id)?.rule),
        None => None,
    };
    let sim = LevelSimulator::new(&data.exp, &consumable.yields)
        .with_bonus(bonus)
        .with_max_iterations(data.planner.max_level_iterations);

    match (args.to, args.budget) {
        (Some(target), None) => {
            let r = sim.to_level(&start, target);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&r)?);
                return Ok(());
            }
            println!(
                "Lv.{} ({}%) -> Lv.{} with {} | {} needed | +{} exp | {}",
                start.level,
                start.progress_pct,
                target,
                consumable.name,
                r.consumed,
                r.gained,
                describe_halt(r.halt)
            );
            print_details(&r.details);
        }
        (None, Some(budget)) => {
            let r = sim.with_budget(&start, budget);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&r)?);
                return Ok(());
            }
            println!(
                "Lv.{} ({}%) + {} x{} -> Lv.{} ({}%) | +{} exp | unused: {} | {}",
                start.level,
                start.progress_pct,
                consumable.name,
                budget,
                r.final_level,
                r.final_progress_pct.round_dp(3),
                r.gained(),
                r.unused,
                describe_halt(r.halt)
            );
            print_details(&r.details);
        }
        _ => bail!("pass exactly one of --to or --budget"),
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let command = match args.command.as_deref() {
        None | Some("help") => {
            println!("{USAGE}");
            return Ok(());
        }
        Some(c) => c.to_string(),
    };

    let assets = args
        .assets
        .clone()
        .or_else(|| std::env::var_os("MAPLE_CALC_ASSETS").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("assets"));
    let mut data = DataSet::load_dir(&assets)
        .with_context(|| format!("loading assets from {}", assets.display()))?;
    if let Some(path) = &args.config {
        data.planner = PlannerConfig::load(path)?;
    }
    info!(%command, assets = %assets.display(), "starting CLI");

    match command.as_str() {
        "presets" => run_presets(&data),
        "ladder" => run_ladder(&data, &args),
        "level" => run_level(&data, &args),
        other => bail!("unknown command {other}\n{USAGE}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calc_ladder::{project_ladder, PeriodYield};
    use chrono::{FixedOffset, Utc};

    fn parse(line: &str) -> Result<Args> {
        parse_args(line.split_whitespace().map(str::to_string))
    }

    #[test]
    fn parses_ladder_flags() {
        let a = parse("ladder --preset genesis --start 2024-01-04 --current 1200 --factor 3 --claimed")
            .unwrap();
        assert_eq!(a.command.as_deref(), Some("ladder"));
        assert_eq!(a.preset.as_deref(), Some("genesis"));
        assert_eq!(a.start, NaiveDate::from_ymd_opt(2024, 1, 4));
        assert_eq!(a.current, Some(1200));
        assert_eq!(a.factor, Some(3));
        assert!(a.claimed);
        assert!(!a.double);
    }

    #[test]
    fn progress_is_clamped() {
        let a = parse("level --from 260 --progress 150 --to 265").unwrap();
        assert_eq!(a.progress, Some(Decimal::ONE_HUNDRED));
        let a = parse("level --from 260 --progress -3 --to 265").unwrap();
        assert_eq!(a.progress, Some(Decimal::ZERO));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse("ladder --current lots").is_err());
        assert!(parse("ladder --preset").is_err());
        assert!(parse("ladder --nope").is_err());
        assert!(parse("ladder level").is_err());
    }

    #[test]
    fn ladder_runs_against_shipped_assets() {
        let assets = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets");
        let data = DataSet::load_dir(assets).unwrap();
        let args = parse("ladder --preset hexa --start 2024-03-01 --json").unwrap();
        run_ladder(&data, &args).unwrap();
        let args = parse("level --from 260 --to 265 --consumable park_ticket --json").unwrap();
        run_level(&data, &args).unwrap();
        let args = parse("level --from 260 --consumable park_ticket").unwrap();
        assert!(run_level(&data, &args).is_err());
    }

    #[test]
    fn start_date_follows_local_zone() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 31, 23, 30, 0).unwrap();
        let utc8 = FixedOffset::east_opt(8 * 3600).unwrap();
        let local = local_date(instant.with_timezone(&utc8));
        assert_eq!(local, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(
            local_date(instant),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
        );

        // a day off shifts which month the monthly credit lands in
        let ladder = calc_core::ThresholdLadder::new(vec![1200]).unwrap();
        let y = PeriodYield {
            weekly: 100,
            monthly: 600,
        };
        let late = project_ladder(&ladder, y, 0, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(late[0].periods, 2);
        assert_eq!(late[0].completion_date, NaiveDate::from_ymd_opt(2024, 2, 7));
        let early = project_ladder(&ladder, y, 0, local);
        assert_eq!(early[0].periods, 6);
        assert_eq!(early[0].completion_date, NaiveDate::from_ymd_opt(2024, 3, 7));
    }

    #[test]
    fn pass_bonus_only_touches_weekly_sources() {
        let mut sources = vec![
            ResourceSource::new("lucid", "lucid", None, Periodicity::Weekly),
            ResourceSource::new("arcane_daily", "arcane_daily", None, Periodicity::Daily),
            ResourceSource::new("black_mage", "black_mage", None, Periodicity::Monthly),
        ];
        let pass = BonusMultiplier {
            factor: 3,
            doubled: true,
        };
        apply_pass(&mut sources, pass);
        assert_eq!(sources[0].bonus, pass);
        assert_eq!(sources[1].bonus, BonusMultiplier::default());
        assert_eq!(sources[2].bonus, BonusMultiplier::default());
    }

    #[test]
    fn budget_summary_reports_gained_exp() {
        let assets = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets");
        let data = DataSet::load_dir(assets).unwrap();
        let args = parse("level --from 260 --budget 40 --consumable park_ticket").unwrap();
        run_level(&data, &args).unwrap();
        let consumable = data.consumable("park_ticket").unwrap();
        let r = LevelSimulator::new(&data.exp, &consumable.yields)
            .with_budget(&LevelState::at(260), 40);
        assert_eq!(r.gained(), r.details.iter().map(|d| d.gained).sum::<u64>());
        assert!(r.gained() > 0);
    }
}
