//! Calendar attribution, month grids and per-day aggregation.
//!
//! Completions are stored in UTC. Deciding which calendar day one belongs to
//! always goes through a [`DayBoundary`], so "completed today" and the
//! calendar agree on where midnight is.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, Local, Month, Months, NaiveDate,
    NaiveDateTime, Offset, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

use crate::config::LabelsConfig;
use crate::error::{Error, Result};
use crate::model::{Completion, RoutineSummary};

/// Cells in a fixed six-week grid
pub const FIXED_GRID_CELLS: usize = 42;

/// Where calendar days start.
///
/// `Local` follows the system time zone, applying whatever offset was in
/// force at each instant, so dates stay put across daylight-saving changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBoundary {
    Local,
    Fixed(FixedOffset),
}

impl DayBoundary {
    pub fn new(offset: FixedOffset) -> Self {
        Self::Fixed(offset)
    }

    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// UTC offset in force at `ts`.
    pub fn offset_at(&self, ts: &DateTime<Utc>) -> FixedOffset {
        match self {
            Self::Local => Local.offset_from_utc_datetime(&ts.naive_utc()),
            Self::Fixed(offset) => *offset,
        }
    }

    /// Wall-clock view of an instant.
    pub fn to_local(&self, ts: &DateTime<Utc>) -> DateTime<FixedOffset> {
        ts.with_timezone(&self.offset_at(ts))
    }

    /// Calendar date of an instant.
    pub fn date_of(&self, ts: &DateTime<Utc>) -> NaiveDate {
        self.to_local(ts).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.date_of(&Utc::now())
    }

    /// Interpret a wall-clock time.
    ///
    /// A time repeated when clocks go back resolves to its first occurrence.
    /// A time skipped when clocks go forward is read with the offset from
    /// before the jump, so 02:30 on a spring-forward night lands at 03:30.
    pub fn local_to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Self::Fixed(offset) => offset
                .from_local_datetime(&local)
                .single()
                .map(|ts| ts.with_timezone(&Utc)),
            Self::Local => match Local.from_local_datetime(&local).earliest() {
                Some(ts) => Some(ts.with_timezone(&Utc)),
                None => {
                    let before = local.checked_sub_signed(Duration::days(1))?;
                    Local
                        .offset_from_utc_datetime(&before)
                        .from_local_datetime(&local)
                        .single()
                        .map(|ts| ts.with_timezone(&Utc))
                }
            },
        }
    }
}

/// Month grid shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridLayout {
    /// Only as many whole weeks as the month touches
    Fitted,
    /// Always six weeks
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_current_month: bool,
}

/// Build the Sunday-first grid for `month` of `year`.
///
/// Leading days come from the previous month and trailing days from the
/// next one, so the grid is always a whole number of weeks.
pub fn month_grid(year: i32, month: Month, layout: GridLayout) -> Result<Vec<CalendarDay>> {
    let first = first_of_month(year, month)?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| out_of_range(year, month))?;

    let leading = first.weekday().num_days_from_sunday();
    let start = first
        .checked_sub_days(Days::new(u64::from(leading)))
        .ok_or_else(|| out_of_range(year, month))?;

    let cells = match layout {
        GridLayout::Fixed => FIXED_GRID_CELLS,
        GridLayout::Fitted => ((leading + last.day()).div_ceil(7) * 7) as usize,
    };

    Ok(start
        .iter_days()
        .take(cells)
        .map(|date| CalendarDay {
            date,
            is_current_month: date.year() == year && date.month() == first.month(),
        })
        .collect())
}

/// First and last date covered by a grid.
pub fn grid_range(grid: &[CalendarDay]) -> Option<RangeInclusive<NaiveDate>> {
    let first = grid.first()?;
    let last = grid.last()?;
    Some(first.date..=last.date)
}

pub fn previous_month(year: i32, month: Month) -> (i32, Month) {
    match month {
        Month::January => (year - 1, Month::December),
        _ => (year, month.pred()),
    }
}

pub fn next_month(year: i32, month: Month) -> (i32, Month) {
    match month {
        Month::December => (year + 1, Month::January),
        _ => (year, month.succ()),
    }
}

/// Parse a 1-based month number.
pub fn month_from_number(number: u32) -> Result<Month> {
    u8::try_from(number)
        .ok()
        .and_then(|n| Month::try_from(n).ok())
        .ok_or_else(|| Error::InvalidArgument(format!("invalid month {number} (expected 1-12)")))
}

fn first_of_month(year: i32, month: Month) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month.number_from_month(), 1)
        .ok_or_else(|| out_of_range(year, month))
}

fn out_of_range(year: i32, month: Month) -> Error {
    Error::InvalidArgument(format!("{} {year} is out of range", month.name()))
}

/// One completion as shown inside a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCompletion {
    pub completion_id: String,
    pub task_id: String,
    pub task_name: String,
    #[serde(with = "crate::model::timestamp")]
    pub completed_at: DateTime<Utc>,
}

/// Completions of one routine on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineDay {
    pub routine_id: String,
    pub routine_name: String,
    pub completions: Vec<DayCompletion>,
}

/// Calendar view: routine groups per day, for days that have completions.
pub type DayAggregation = BTreeMap<NaiveDate, Vec<RoutineDay>>;

/// Group completions by calendar day and then by routine.
///
/// Days without completions are absent. Routine groups follow the order of
/// `routines`; groups for routines missing from it come last, by id.
/// Within a group completions are in time order.
pub fn aggregate_by_date(
    histories: &BTreeMap<String, Vec<Completion>>,
    routines: &[RoutineSummary],
    range: RangeInclusive<NaiveDate>,
    boundary: &DayBoundary,
    labels: &LabelsConfig,
) -> DayAggregation {
    let rank = |routine_id: &str| {
        routines
            .iter()
            .position(|routine| routine.id == routine_id)
            .unwrap_or(routines.len())
    };

    let mut days: DayAggregation = BTreeMap::new();
    for (routine_id, history) in histories {
        let routine_name = routines
            .iter()
            .find(|routine| &routine.id == routine_id)
            .map(|routine| routine.name.clone());

        for completion in history {
            let date = boundary.date_of(&completion.completed_at);
            if !range.contains(&date) {
                continue;
            }
            let groups = days.entry(date).or_default();
            let index = match groups.iter().position(|g| &g.routine_id == routine_id) {
                Some(index) => index,
                None => {
                    groups.push(RoutineDay {
                        routine_id: routine_id.clone(),
                        routine_name: routine_name
                            .clone()
                            .or_else(|| completion.routine_name.clone())
                            .unwrap_or_else(|| labels.deleted_routine.clone()),
                        completions: Vec::new(),
                    });
                    groups.len() - 1
                }
            };
            groups[index].completions.push(DayCompletion {
                completion_id: completion.id.clone(),
                task_id: completion.task_id.clone(),
                task_name: completion
                    .task_name
                    .clone()
                    .unwrap_or_else(|| labels.deleted_task.clone()),
                completed_at: completion.completed_at,
            });
        }
    }

    for groups in days.values_mut() {
        groups.sort_by(|a, b| {
            rank(&a.routine_id)
                .cmp(&rank(&b.routine_id))
                .then_with(|| a.routine_id.cmp(&b.routine_id))
        });
        for group in groups.iter_mut() {
            group
                .completions
                .sort_by(|a, b| a.completed_at.cmp(&b.completed_at));
        }
    }
    days
}

/// Grid cell with the per-day totals a calendar renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub is_current_month: bool,
    pub is_today: bool,
    pub completion_count: usize,
}

impl CalendarCell {
    pub fn has_completions(&self) -> bool {
        self.completion_count > 0
    }
}

pub fn annotate(
    grid: &[CalendarDay],
    days: &DayAggregation,
    today: NaiveDate,
) -> Vec<CalendarCell> {
    grid.iter()
        .map(|day| CalendarCell {
            date: day.date,
            is_current_month: day.is_current_month,
            is_today: day.date == today,
            completion_count: days
                .get(&day.date)
                .map(|groups| groups.iter().map(|g| g.completions.len()).sum())
                .unwrap_or(0),
        })
        .collect()
}
