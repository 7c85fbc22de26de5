//! Derived views over a routine and its completion history.
//!
//! Everything here is a pure function of its arguments. Nothing reads the
//! clock or storage; "today" is always passed in.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::DayBoundary;
use crate::config::NextTaskConfig;
use crate::model::{Completion, Routine, Task};

/// What [`next_task`] offers once every task counts as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhenAllComplete {
    /// Nothing left to do
    Stop,
    /// Start over at the first task
    Wrap,
}

/// Which completions make a task count as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextTaskWindow {
    AllTime,
    Today,
}

/// Resolved completion window, with "today" pinned to a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionWindow {
    AllTime,
    Day {
        date: NaiveDate,
        boundary: DayBoundary,
    },
}

impl CompletionWindow {
    pub fn contains(&self, completed_at: &DateTime<Utc>) -> bool {
        match self {
            CompletionWindow::AllTime => true,
            CompletionWindow::Day { date, boundary } => boundary.date_of(completed_at) == *date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextTaskPolicy {
    pub when_all_complete: WhenAllComplete,
    pub window: CompletionWindow,
}

impl Default for NextTaskPolicy {
    fn default() -> Self {
        Self {
            when_all_complete: WhenAllComplete::Stop,
            window: CompletionWindow::AllTime,
        }
    }
}

impl NextTaskPolicy {
    pub fn from_config(config: &NextTaskConfig, boundary: DayBoundary, today: NaiveDate) -> Self {
        let window = match config.window {
            NextTaskWindow::AllTime => CompletionWindow::AllTime,
            NextTaskWindow::Today => CompletionWindow::Day {
                date: today,
                boundary,
            },
        };
        Self {
            when_all_complete: config.when_all_complete,
            window,
        }
    }
}

/// Completions recorded against `task_id`.
pub fn completions_for_task<'a>(history: &'a [Completion], task_id: &str) -> Vec<&'a Completion> {
    history
        .iter()
        .filter(|completion| completion.task_id == task_id)
        .collect()
}

/// Completion count per task id of `routine`. Tasks never completed map to 0;
/// orphaned completions are not counted.
pub fn completion_counts(routine: &Routine, history: &[Completion]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = routine
        .tasks
        .iter()
        .map(|task| (task.id.clone(), 0))
        .collect();
    for completion in history
        .iter()
        .filter(|completion| completion.routine_id == routine.id)
    {
        if let Some(count) = counts.get_mut(&completion.task_id) {
            *count += 1;
        }
    }
    counts
}

/// First task, in routine order, with no completion inside the policy window.
pub fn next_task<'a>(
    routine: &'a Routine,
    history: &[Completion],
    policy: &NextTaskPolicy,
) -> Option<&'a Task> {
    let done = |task: &Task| {
        history.iter().any(|completion| {
            completion.routine_id == routine.id
                && completion.task_id == task.id
                && policy.window.contains(&completion.completed_at)
        })
    };

    routine
        .tasks
        .iter()
        .find(|task| !done(task))
        .or_else(|| match policy.when_all_complete {
            WhenAllComplete::Stop => None,
            WhenAllComplete::Wrap => routine.tasks.first(),
        })
}

/// True iff `task_id` of `routine` has a completion whose calendar date is `date`.
pub fn is_completed_today(
    routine: &Routine,
    task_id: &str,
    history: &[Completion],
    date: NaiveDate,
    boundary: &DayBoundary,
) -> bool {
    history.iter().any(|c| {
        c.routine_id == routine.id
            && c.task_id == task_id
            && boundary.date_of(&c.completed_at) == date
    })
}

/// Per-task row for routine detail screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatus {
    #[serde(flatten)]
    pub task: Task,
    pub completions: usize,
    pub completed_today: bool,
}

pub fn task_statuses(
    routine: &Routine,
    history: &[Completion],
    today: NaiveDate,
    boundary: &DayBoundary,
) -> Vec<TaskStatus> {
    let counts = completion_counts(routine, history);
    routine
        .tasks
        .iter()
        .map(|task| TaskStatus {
            task: task.clone(),
            completions: counts.get(&task.id).copied().unwrap_or(0),
            completed_today: is_completed_today(routine, &task.id, history, today, boundary),
        })
        .collect()
}

/// Completions sharing a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayHistory {
    pub date: NaiveDate,
    pub completions: Vec<Completion>,
}

/// Group history by calendar date, newest day first and newest entry first
/// within a day.
pub fn group_by_day(history: &[Completion], boundary: &DayBoundary) -> Vec<DayHistory> {
    let mut sorted: Vec<&Completion> = history.iter().collect();
    sorted.sort_by(|a, b| {
        b.completed_at
            .cmp(&a.completed_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    let mut days: Vec<DayHistory> = Vec::new();
    for completion in sorted {
        let date = boundary.date_of(&completion.completed_at);
        let same_day = days.last().is_some_and(|day| day.date == date);
        if same_day {
            if let Some(day) = days.last_mut() {
                day.completions.push(completion.clone());
            }
        } else {
            days.push(DayHistory {
                date,
                completions: vec![completion.clone()],
            });
        }
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp;
    use chrono::FixedOffset;

    fn routine(task_ids: &[&str]) -> Routine {
        Routine {
            id: "r1".to_string(),
            name: "Morning".to_string(),
            description: None,
            tasks: task_ids
                .iter()
                .enumerate()
                .map(|(position, id)| Task {
                    id: id.to_string(),
                    name: id.to_uppercase(),
                    description: None,
                    position,
                })
                .collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn done(task_id: &str, raw: &str) -> Completion {
        Completion::new("r1", task_id, parse_timestamp(raw).unwrap())
    }

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_next_task_skips_completed() {
        let routine = routine(&["a", "b", "c"]);
        let history = vec![done("a", "2024-01-01T08:00:00Z")];
        let policy = NextTaskPolicy::default();

        let first = next_task(&routine, &history, &policy).map(|t| t.id.clone());
        let second = next_task(&routine, &history, &policy).map(|t| t.id.clone());
        assert_eq!(first.as_deref(), Some("b"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_next_task_prefers_uncompleted_over_order() {
        let routine = routine(&["a", "b", "c", "d"]);
        let history = vec![
            done("a", "2024-01-01T08:00:00Z"),
            done("b", "2024-01-01T08:01:00Z"),
            done("d", "2024-01-01T08:02:00Z"),
        ];
        let next = next_task(&routine, &history, &NextTaskPolicy::default()).unwrap();
        assert_eq!(next.id, "c");
    }

    #[test]
    fn test_next_task_when_all_complete() {
        let routine = routine(&["a", "b"]);
        let history = vec![
            done("a", "2024-01-01T08:00:00Z"),
            done("b", "2024-01-01T08:01:00Z"),
        ];

        assert!(next_task(&routine, &history, &NextTaskPolicy::default()).is_none());

        let wrap = NextTaskPolicy {
            when_all_complete: WhenAllComplete::Wrap,
            ..NextTaskPolicy::default()
        };
        assert_eq!(next_task(&routine, &history, &wrap).unwrap().id, "a");
        assert!(next_task(&self::routine(&[]), &[], &wrap).is_none());
    }

    #[test]
    fn test_next_task_today_window() {
        let routine = routine(&["a", "b"]);
        let history = vec![
            done("a", "2024-01-02T08:00:00Z"),
            done("b", "2024-01-01T08:00:00Z"),
        ];
        let config = NextTaskConfig {
            when_all_complete: WhenAllComplete::Stop,
            window: NextTaskWindow::Today,
        };
        let policy = NextTaskPolicy::from_config(&config, DayBoundary::utc(), day("2024-01-02"));

        // "b" was done yesterday, so it is due again today
        assert_eq!(next_task(&routine, &history, &policy).unwrap().id, "b");
    }

    #[test]
    fn test_next_task_ignores_other_routines() {
        let routine = routine(&["a"]);
        let foreign = Completion::new("r2", "a", Utc::now());
        let next = next_task(&routine, &[foreign], &NextTaskPolicy::default()).unwrap();
        assert_eq!(next.id, "a");
    }

    #[test]
    fn test_completed_today_matches_calendar_attribution() {
        let routine = routine(&["a", "b"]);
        let boundary = DayBoundary::new(FixedOffset::east_opt(2 * 3600).unwrap());
        let history = vec![
            done("a", "2024-06-30T23:59:59+02:00"),
            done("b", "2024-07-01T00:00:01+02:00"),
        ];
        let check = |task_id: &str, raw: &str| {
            is_completed_today(&routine, task_id, &history, day(raw), &boundary)
        };

        assert!(check("a", "2024-06-30"));
        assert!(!check("a", "2024-07-01"));
        assert!(check("b", "2024-07-01"));
        assert!(!check("b", "2024-06-30"));
    }

    #[test]
    fn test_completed_today_ignores_other_routines() {
        let routine = routine(&["a"]);
        let today = day("2024-01-02");
        let foreign = vec![Completion::new(
            "r2",
            "a",
            parse_timestamp("2024-01-02T08:00:00Z").unwrap(),
        )];

        assert!(!is_completed_today(&routine, "a", &foreign, today, &DayBoundary::utc()));
        let statuses = task_statuses(&routine, &foreign, today, &DayBoundary::utc());
        assert!(!statuses[0].completed_today);
    }

    #[test]
    fn test_counts_and_statuses() {
        let routine = routine(&["a", "b"]);
        let history = vec![
            done("a", "2024-01-01T08:00:00Z"),
            done("a", "2024-01-02T08:00:00Z"),
            done("zombie", "2024-01-02T08:00:00Z"),
        ];

        let counts = completion_counts(&routine, &history);
        assert_eq!(counts["a"], 2);
        assert_eq!(counts["b"], 0);
        assert!(!counts.contains_key("zombie"));

        let statuses = task_statuses(&routine, &history, day("2024-01-02"), &DayBoundary::utc());
        assert_eq!(statuses[0].completions, 2);
        assert!(statuses[0].completed_today);
        assert!(!statuses[1].completed_today);
        assert_eq!(completions_for_task(&history, "a").len(), 2);
    }

    #[test]
    fn test_group_by_day_newest_first() {
        let history = vec![
            done("a", "2024-01-01T08:00:00Z"),
            done("b", "2024-01-02T09:00:00Z"),
            done("a", "2024-01-02T07:00:00Z"),
        ];
        let days = group_by_day(&history, &DayBoundary::utc());

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, day("2024-01-02"));
        assert_eq!(days[0].completions[0].task_id, "b");
        assert_eq!(days[0].completions[1].task_id, "a");
        assert_eq!(days[1].date, day("2024-01-01"));
    }
}
