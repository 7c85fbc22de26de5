mod support;

use chrono::{FixedOffset, Month, NaiveDate};
use routines::calendar::{aggregate_by_date, month_grid, DayBoundary, GridLayout};
use routines::config::LabelsConfig;
use routines::model::parse_timestamp;
use routines::views::{is_completed_today, next_task, NextTaskPolicy};

use support::{TestData, BACKENDS};

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
}

#[test]
fn backdated_completions_keep_their_timestamp() {
    for backend in BACKENDS {
        let data = TestData::init(backend);
        let routine = data.seed_routine("Morning", &["a"]);
        let tracker = data.tracker();
        let at = parse_timestamp("2024-06-30T21:59:59.123Z").expect("ts");

        let recorded = tracker
            .ledger()
            .complete_task(&routine.id, &routine.tasks[0].id, Some(at))
            .expect("complete");

        let history = tracker.ledger().get_history(&routine.id).expect("history");
        assert_eq!(history.len(), 1, "backend {backend:?}");
        assert_eq!(history[0].id, recorded.id);
        assert_eq!(history[0].completed_at, at);
    }
}

#[test]
fn removed_task_history_uses_fallback_label() {
    for backend in BACKENDS {
        let data = TestData::init(backend);
        let routine = data.seed_routine("Morning", &["Stretch", "Water"]);
        let tracker = data.tracker();
        let stretch = routine.tasks[0].id.clone();
        tracker
            .ledger()
            .complete_task(&routine.id, &stretch, None)
            .expect("complete");

        let mut draft = routine.to_draft();
        draft.remove_task(&stretch).expect("remove");
        tracker.repository().save_routine(draft).expect("save");

        let history = tracker.ledger().get_history(&routine.id).expect("history");
        assert_eq!(history.len(), 1, "backend {backend:?}");
        assert_eq!(history[0].task_id, stretch);
        assert_eq!(history[0].task_name.as_deref(), Some("Deleted task"));
        assert_eq!(history[0].routine_name.as_deref(), Some("Morning"));
    }
}

#[test]
fn renamed_task_shows_current_name() {
    for backend in BACKENDS {
        let data = TestData::init(backend);
        let routine = data.seed_routine("Morning", &["Stretch"]);
        let tracker = data.tracker();
        let task_id = routine.tasks[0].id.clone();
        tracker
            .ledger()
            .complete_task(&routine.id, &task_id, None)
            .expect("complete");

        let mut draft = routine.to_draft();
        draft
            .edit_task(&task_id, Some("Yoga".to_string()), None)
            .expect("edit");
        tracker.repository().save_routine(draft).expect("save");

        let history = tracker.ledger().get_history(&routine.id).expect("history");
        assert_eq!(history[0].task_name.as_deref(), Some("Yoga"), "backend {backend:?}");
    }
}

#[test]
fn next_task_follows_recorded_history() {
    for backend in BACKENDS {
        let data = TestData::init(backend);
        let routine = data.seed_routine("Morning", &["a", "b", "c"]);
        let tracker = data.tracker();
        let policy = NextTaskPolicy::default();

        for task in &routine.tasks {
            let history = tracker.ledger().get_history(&routine.id).expect("history");
            let next = next_task(&routine, &history, &policy).expect("task left");
            assert_eq!(next.id, task.id, "backend {backend:?}");
            tracker
                .ledger()
                .complete_task(&routine.id, &next.id, None)
                .expect("complete");
        }

        let history = tracker.ledger().get_history(&routine.id).expect("history");
        assert!(next_task(&routine, &history, &policy).is_none());
    }
}

#[test]
fn day_boundary_agrees_between_views() {
    for backend in BACKENDS {
        let data = TestData::init(backend);
        data.write_config(&format!(
            "[storage]\nbackend = \"{}\"\n\n[calendar]\nutc_offset = \"+02:00\"\n",
            if backend == routines::config::BackendKind::Files { "files" } else { "sqlite" }
        ))
        .expect("config");
        let routine = data.seed_routine("Morning", &["late", "early"]);
        let tracker = data.tracker();
        let boundary = tracker.day_boundary().expect("boundary");
        assert_eq!(boundary, DayBoundary::new(FixedOffset::east_opt(7200).unwrap()));

        let late = &routine.tasks[0].id;
        let early = &routine.tasks[1].id;
        let ledger = tracker.ledger();
        for (task_id, raw) in [
            (late, "2024-06-30T23:59:59+02:00"),
            (early, "2024-07-01T00:00:01+02:00"),
        ] {
            let at = parse_timestamp(raw).expect("timestamp");
            ledger
                .complete_task(&routine.id, task_id, Some(at))
                .expect("complete");
        }

        let history = ledger.get_history(&routine.id).expect("history");
        let completed_on = |task_id: &str, raw: &str| {
            is_completed_today(&routine, task_id, &history, date(raw), &boundary)
        };
        assert!(completed_on(late.as_str(), "2024-06-30"));
        assert!(!completed_on(late.as_str(), "2024-07-01"));
        assert!(completed_on(early.as_str(), "2024-07-01"));

        let all = ledger.get_all_histories().expect("all");
        let routines = tracker.repository().list_routines().expect("list");
        let days = aggregate_by_date(
            &all,
            &routines,
            date("2024-06-01")..=date("2024-07-31"),
            &boundary,
            &LabelsConfig::default(),
        );
        assert_eq!(days.len(), 2, "backend {backend:?}");
        assert_eq!(days[&date("2024-06-30")][0].completions[0].task_id, *late);
        assert_eq!(days[&date("2024-07-01")][0].completions[0].task_id, *early);
    }
}

#[test]
fn delete_by_id_and_value() {
    for backend in BACKENDS {
        let data = TestData::init(backend);
        let routine = data.seed_routine("Morning", &["a"]);
        let tracker = data.tracker();
        let ledger = tracker.ledger();
        let task_id = &routine.tasks[0].id;
        let at = parse_timestamp("2024-01-01T08:00:00Z").unwrap();

        let first = ledger.complete_task(&routine.id, task_id, Some(at)).expect("complete");
        ledger.complete_task(&routine.id, task_id, Some(at)).expect("complete");

        assert!(matches!(
            ledger.delete_completion(&routine.id, task_id, at),
            Err(routines::Error::AmbiguousCompletion { .. })
        ));
        assert_eq!(ledger.get_history(&routine.id).unwrap().len(), 2);

        assert!(ledger.delete_completion_by_id(&routine.id, &first.id).expect("by id"));
        assert!(ledger.delete_completion(&routine.id, task_id, at).expect("by value"));
        assert!(ledger.get_history(&routine.id).unwrap().is_empty(), "backend {backend:?}");
    }
}

#[test]
fn february_2024_grid_fills_whole_weeks() {
    let grid = month_grid(2024, Month::February, GridLayout::Fitted).expect("grid");
    assert_eq!(grid.len() % 7, 0);
    assert_eq!(grid.iter().filter(|d| d.is_current_month).count(), 29);

    let fixed = month_grid(2024, Month::February, GridLayout::Fixed).expect("grid");
    assert_eq!(fixed.len(), 42);
    assert_eq!(fixed.iter().filter(|d| d.is_current_month).count(), 29);

}
