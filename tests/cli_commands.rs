mod support;

use predicates::str::contains;
use routines::config::BackendKind;

use support::{json_output, TestData};

#[test]
fn init_creates_config() {
    let data = TestData::empty();
    data.cmd()
        .args(["init", "--backend", "sqlite"])
        .assert()
        .success()
        .stdout(contains("initialized data directory"));

    let config = std::fs::read_to_string(data.path().join("routines.toml")).expect("config");
    assert!(config.contains("backend = \"sqlite\""));
    assert!(data.path().join("routines.db").exists());
}

#[test]
fn init_rejects_unknown_backend() {
    let data = TestData::empty();
    data.cmd()
        .args(["init", "--backend", "postgres"])
        .assert()
        .code(2)
        .stderr(contains("unknown backend"));
}

#[test]
fn new_show_done_flow() {
    let data = TestData::init(BackendKind::Files);
    let output = data
        .cmd()
        .args(["--json", "new", "Morning", "--task", "Stretch", "--task", "Water"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let created = json_output(&output);
    assert_eq!(created["schema_version"], "routines.v1");
    assert_eq!(created["command"], "new");
    assert_eq!(created["data"]["tasks"].as_array().map(Vec::len), Some(2));

    data.cmd()
        .args(["next", "morning"])
        .assert()
        .success()
        .stdout(contains("1. Stretch"));

    data.cmd()
        .args(["done", "Morning"])
        .assert()
        .success()
        .stdout(contains("done: Stretch"));

    let output = data
        .cmd()
        .args(["--json", "show", "Morning"])
        .output()
        .expect("run");
    let shown = json_output(&output);
    assert_eq!(shown["data"]["tasks"][0]["completions"], 1);
    assert_eq!(shown["data"]["next_task"]["name"], "Water");

    data.cmd()
        .args(["done", "Morning", "2"])
        .assert()
        .success();
    data.cmd()
        .args(["next", "Morning"])
        .assert()
        .success()
        .stdout(contains("all tasks done"));
    data.cmd()
        .args(["done", "Morning"])
        .assert()
        .code(2)
        .stderr(contains("every task"));
}

#[test]
fn task_move_renumbers() {
    let data = TestData::init(BackendKind::Sqlite);
    data.seed_routine("Morning", &["a", "b", "c", "d"]);

    let output = data
        .cmd()
        .args(["--json", "task", "move", "Morning", "c", "--to", "1"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let moved = json_output(&output);
    assert_eq!(moved["command"], "task move");
    let tasks = moved["data"]["tasks"].as_array().expect("tasks");
    let names: Vec<_> = tasks.iter().map(|t| t["name"].as_str().unwrap_or("")).collect();
    let positions: Vec<_> = tasks.iter().map(|t| t["position"].as_u64().unwrap_or(99)).collect();
    assert_eq!(names, vec!["c", "a", "b", "d"]);
    assert_eq!(positions, vec![0, 1, 2, 3]);
}

#[test]
fn backdated_done_shows_in_day_and_calendar() {
    let data = TestData::init(BackendKind::Files);
    data.seed_routine("Morning", &["Stretch"]);

    data.cmd()
        .args(["done", "Morning", "Stretch", "--at", "2024-02-10T08:00:00Z"])
        .assert()
        .success();

    data.cmd()
        .args(["day", "2024-02-10"])
        .assert()
        .success()
        .stdout(contains("Morning:"))
        .stdout(contains("08:00  Stretch"));

    let output = data
        .cmd()
        .args(["--json", "calendar", "--year", "2024", "--month", "2"])
        .output()
        .expect("run");
    let calendar = json_output(&output);
    let cells = calendar["data"]["cells"].as_array().expect("cells");
    assert_eq!(cells.len(), 35);
    assert_eq!(calendar["data"]["previous"]["month"], 1);
    assert_eq!(calendar["data"]["next"]["month"], 3);
    let current = cells
        .iter()
        .filter(|c| c["is_current_month"] == true)
        .count();
    assert_eq!(current, 29);
    let tenth = cells
        .iter()
        .find(|c| c["date"] == "2024-02-10")
        .expect("tenth");
    assert_eq!(tenth["completion_count"], 1);
}

#[test]
fn history_rm_by_value_and_id() {
    let data = TestData::init(BackendKind::Sqlite);
    data.seed_routine("Morning", &["Stretch"]);

    for _ in 0..2 {
        data.cmd()
            .args(["done", "Morning", "1", "--at", "2024-02-10T08:00:00Z"])
            .assert()
            .success();
    }

    let output = data
        .cmd()
        .args([
            "--json",
            "history-rm",
            "Morning",
            "--task",
            "1",
            "--at",
            "2024-02-10T08:00:00Z",
        ])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(3));
    let error = json_output(&output);
    assert_eq!(error["status"], "error");
    assert_eq!(error["error"]["kind"], "conflict");
    assert_eq!(error["error"]["details"]["matches"], 2);

    let output = data
        .cmd()
        .args(["--json", "history", "Morning"])
        .output()
        .expect("run");
    let history = json_output(&output);
    assert_eq!(history["data"]["total"], 2);
    let id = history["data"]["days"][0]["completions"][0]["id"]
        .as_str()
        .expect("id")
        .to_string();

    data.cmd()
        .args(["history-rm", "Morning", &id])
        .assert()
        .success();
    data.cmd()
        .args(["history-rm", "Morning", &id])
        .assert()
        .code(2);
    data.cmd()
        .args([
            "history-rm",
            "Morning",
            "--task",
            "1",
            "--at",
            "2024-02-10T08:00:00Z",
        ])
        .assert()
        .success();
}

#[test]
fn rm_deletes_routine() {
    let data = TestData::init(BackendKind::Files);
    let routine = data.seed_routine("Morning", &["a"]);
    data.cmd().args(["done", "Morning"]).assert().success();

    data.cmd()
        .args(["rm", &routine.id])
        .assert()
        .success()
        .stdout(contains("deleted routine Morning"));

    assert!(!data.path().join("history").join(format!("{}.jsonl", routine.id)).exists());
    data.cmd()
        .args(["show", "Morning"])
        .assert()
        .code(2)
        .stderr(contains("Routine not found"));
}

#[test]
fn unknown_routine_reports_json_error() {
    let data = TestData::init(BackendKind::Files);
    let output = data
        .cmd()
        .args(["--json", "task", "add", "Nope", "Stretch"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
    let error = json_output(&output);
    assert_eq!(error["command"], "task add");
    assert_eq!(error["error"]["kind"], "user_error");
    assert_eq!(error["error"]["details"]["routine_id"], "Nope");
}

#[test]
fn local_boundary_follows_daylight_saving() {
    let data = TestData::init(BackendKind::Files);
    data.write_config("[storage]\nbackend = \"files\"\n\n[calendar]\nutc_offset = \"local\"\n")
        .expect("config");
    data.seed_routine("Morning", &["Stretch"]);
    let berlin = |args: &[&str]| {
        let output = data
            .cmd()
            .env("TZ", "Europe/Berlin")
            .arg("--json")
            .args(args)
            .output()
            .expect("run");
        assert!(output.status.success(), "{args:?} failed");
        json_output(&output)
    };

    // Winter is +01:00 and summer is +02:00, whatever the offset is today
    let winter = berlin(&["done", "Morning", "1", "--at", "2024-01-15 23:30"]);
    assert_eq!(winter["data"]["completed_at"], "2024-01-15T22:30:00.000Z");
    let summer = berlin(&["done", "Morning", "1", "--at", "2024-07-15 23:30"]);
    assert_eq!(summer["data"]["completed_at"], "2024-07-15T21:30:00.000Z");

    for day in ["2024-01-15", "2024-07-15"] {
        let report = berlin(&["day", day]);
        let routines = report["data"]["routines"].as_array().expect("routines");
        assert_eq!(routines.len(), 1, "nothing filed under {day}");
    }
    let after = berlin(&["day", "2024-01-16"]);
    assert_eq!(after["data"]["routines"].as_array().map(Vec::len), Some(0));

    // 02:30 does not exist on 2024-03-31 and happens twice on 2024-10-27
    let skipped = berlin(&["done", "Morning", "1", "--at", "2024-03-31 02:30"]);
    assert_eq!(skipped["data"]["completed_at"], "2024-03-31T01:30:00.000Z");
    let repeated = berlin(&["done", "Morning", "1", "--at", "2024-10-27 02:30"]);
    assert_eq!(repeated["data"]["completed_at"], "2024-10-27T00:30:00.000Z");
}
