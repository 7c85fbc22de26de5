//! Calendar commands: calendar, day.

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};

use crate::calendar::{
    aggregate_by_date, annotate, grid_range, month_from_number, month_grid, next_month,
    previous_month, CalendarCell, DayAggregation, GridLayout, RoutineDay,
};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};

use super::open_tracker;

pub struct CalendarOptions {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct DayOptions {
    pub date: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct CalendarReport {
    year: i32,
    month: u32,
    layout: GridLayout,
    previous: MonthRef,
    next: MonthRef,
    cells: Vec<CalendarCell>,
    days: DayAggregation,
}

#[derive(serde::Serialize)]
struct MonthRef {
    year: i32,
    month: u32,
}

impl MonthRef {
    fn new((year, month): (i32, chrono::Month)) -> Self {
        Self {
            year,
            month: month.number_from_month(),
        }
    }
}

#[derive(serde::Serialize)]
struct DayReport {
    date: NaiveDate,
    routines: Vec<RoutineDay>,
}

pub fn run_calendar(options: CalendarOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let boundary = tracker.day_boundary()?;
    let today = boundary.today();

    let year = options.year.unwrap_or_else(|| today.year());
    let month = month_from_number(options.month.unwrap_or_else(|| today.month()))?;
    let layout = tracker.config().calendar.layout;

    let grid = month_grid(year, month, layout)?;
    let range = grid_range(&grid)
        .ok_or_else(|| Error::OperationFailed("empty month grid".to_string()))?;
    let routines = tracker.repository().list_routines()?;
    let histories = tracker.ledger().get_all_histories()?;
    let days = aggregate_by_date(&histories, &routines, range, &boundary, &tracker.config().labels);
    let cells = annotate(&grid, &days, today);

    let mut human = HumanOutput::new(format!("{} {year}", month.name()));
    human.push_line("Calendar", "Su  Mo  Tu  We  Th  Fr  Sa");
    for week in cells.chunks(7) {
        let row: Vec<String> = week.iter().map(render_cell).collect();
        human.push_line("Calendar", row.join(" ").trim_end().to_string());
    }
    let active = cells
        .iter()
        .filter(|cell| cell.is_current_month && cell.has_completions())
        .count();
    human.push_summary("active days", active.to_string());

    let previous = MonthRef::new(previous_month(year, month));
    let next = MonthRef::new(next_month(year, month));
    human.push_next_step(format!(
        "routines calendar --year {} --month {}",
        next.year, next.month
    ));

    let report = CalendarReport {
        year,
        month: month.number_from_month(),
        layout,
        previous,
        next,
        cells,
        days,
    };
    emit_success(options.output, "calendar", &report, Some(&human))
}

pub fn run_day(options: DayOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let boundary = tracker.day_boundary()?;
    let date = match options.date.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|err| {
            Error::InvalidArgument(format!("invalid date '{raw}': {err} (expected YYYY-MM-DD)"))
        })?,
        None => boundary.today(),
    };

    let routines = tracker.repository().list_routines()?;
    let histories = tracker.ledger().get_all_histories()?;
    let mut days = aggregate_by_date(
        &histories,
        &routines,
        date..=date,
        &boundary,
        &tracker.config().labels,
    );
    let groups = days.remove(&date).unwrap_or_default();

    let mut human = HumanOutput::new(date.format("%A %Y-%m-%d").to_string());
    if groups.is_empty() {
        human.push_summary("completions", "0");
    }
    for group in &groups {
        for completion in &group.completions {
            let local = boundary.to_local(&completion.completed_at);
            human.push_line(
                &group.routine_name,
                format!("{}  {}", local.format("%H:%M"), completion.task_name),
            );
        }
    }

    let report = DayReport {
        date,
        routines: groups,
    };
    emit_success(options.output, "day", &report, Some(&human))
}

fn render_cell(cell: &CalendarCell) -> String {
    if !cell.is_current_month {
        return "  .".to_string();
    }
    let marker = if cell.is_today {
        '<'
    } else if cell.has_completions() {
        '*'
    } else {
        ' '
    };
    format!("{:>2}{marker}", cell.date.day())
}
