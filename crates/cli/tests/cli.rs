// End-to-end tests for the `callwatch` binary against a mock feed.
// Run with: cargo test -p callwatch-cli --test cli

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use httpmock::prelude::*;
use tempfile::TempDir;

const POLICE_PATH: &str = "/Police/V1.0/Calls/CallsForService";
const FIRE_PATH: &str = "/Fire/V1.0/Calls/CallsForService";

fn callwatch() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_callwatch"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    // Keep the developer's own settings out of the tests
    cmd.env_remove("CALLWATCH_FEED_URL");
    cmd.env_remove("CALLWATCH_DB");
    cmd.env_remove("CALLWATCH_CONFIG");
    cmd.env_remove("RUST_LOG");
    cmd
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(base_url: &str) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            format!(
                "[feed]\nbase_url = \"{}\"\ntimeout_secs = 5\nretry_base_ms = 0\n\n[harvest]\ndeadline_secs = 20\n",
                base_url
            ),
        )
        .unwrap();
        Self { dir }
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("data").join("calls.db")
    }

    fn run(&self, args: &[&str]) -> Output {
        callwatch()
            .arg("--config")
            .arg(self.config())
            .arg("--db")
            .arg(self.db())
            .args(args)
            .output()
            .expect("failed to run callwatch")
    }
}

fn assert_exit(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "expected exit {}, got {:?}\nstdout: {}\nstderr: {}",
        code,
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
}

fn police_body(status: &str) -> serde_json::Value {
    serde_json::json!([{
        "id": "0123",
        "callReceived": "3/23/2022 11:22:39 PM",
        "location": "22XX FAKE RD",
        "type": "SUSPICIOUS SITUATION",
        "currentStatus": status,
        "area": "11",
        "priority": "3",
        "callReceivedFormatted": "3/23/2022 11:22 PM"
    }])
}

fn fire_body() -> serde_json::Value {
    serde_json::json!([{
        "id": "1234",
        "callReceived": "3/27/2022 12:30:25 PM",
        "location": "123XX DIFFERENT ST",
        "type": "EMS CALL",
        "currentStatus": "Dispatched",
        "area": "F20",
        "priority": "3",
        "callReceivedFormatted": "3/27/2022 12:30 PM"
    }])
}

fn active_json(ws: &Workspace) -> Vec<serde_json::Value> {
    let output = ws.run(&["active", "--json"]);
    assert_exit(&output, 0);
    serde_json::from_slice(&output.stdout).expect("active --json output")
}

#[test]
fn harvest_creates_then_resolves() {
    let server = MockServer::start();
    let mut police = server.mock(|when, then| {
        when.method(GET).path(POLICE_PATH);
        then.status(200).json_body(police_body("Dispatched"));
    });
    let mut fire = server.mock(|when, then| {
        when.method(GET).path(FIRE_PATH);
        then.status(200).json_body(fire_body());
    });
    let ws = Workspace::new(&server.base_url());

    let output = ws.run(&["harvest", "--json"]);
    assert_exit(&output, 0);
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["categories"][0]["category"], "police");
    assert_eq!(report["categories"][0]["created"], 1);
    assert_eq!(report["categories"][1]["created"], 1);
    police.assert();
    fire.assert();

    let active = active_json(&ws);
    assert_eq!(active.len(), 2);
    assert_eq!(active[0]["sort_key"], "2022/03/23#0123#police");
    assert_eq!(active[0]["last_known_status"], "dispatched");
    assert_eq!(active[0]["house_number"], "22XX");
    assert_eq!(active[1]["sort_key"], "2022/03/27#1234#fire");

    // Both calls leave the feed.
    police.delete();
    fire.delete();
    server.mock(|when, then| {
        when.method(GET);
        then.status(200).json_body(serde_json::json!([]));
    });

    let output = ws.run(&["harvest"]);
    assert_exit(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("police: 0 fetched, 0 created, 0 updated, 1 resolved"), "{stdout}");

    assert!(active_json(&ws).is_empty());
}

#[test]
fn active_filters_by_category() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(POLICE_PATH);
        then.status(200).json_body(police_body("On Scene"));
    });
    server.mock(|when, then| {
        when.method(GET).path(FIRE_PATH);
        then.status(200).json_body(fire_body());
    });
    let ws = Workspace::new(&server.base_url());
    assert_exit(&ws.run(&["harvest"]), 0);

    let output = ws.run(&["active", "--category", "police"]);
    assert_exit(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0123"), "{stdout}");
    assert!(stdout.contains("on scene"), "{stdout}");
    assert!(!stdout.contains("1234"), "{stdout}");
}

#[test]
fn feed_http_error_exits_51() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(POLICE_PATH);
        then.status(200).json_body(police_body("Dispatched"));
    });
    let fire = server.mock(|when, then| {
        when.method(GET).path(FIRE_PATH);
        then.status(500).body("");
    });
    let ws = Workspace::new(&server.base_url());

    let output = ws.run(&["harvest"]);
    assert_exit(&output, 51);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("fire feed"), "stderr: {stderr}");
    // one retry by default
    fire.assert_calls(2);

    assert!(active_json(&ws).is_empty());
}

#[test]
fn unknown_status_exits_60_and_writes_nothing() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(POLICE_PATH);
        then.status(200).json_body(police_body("missing"));
    });
    server.mock(|when, then| {
        when.method(GET).path(FIRE_PATH);
        then.status(200).json_body(fire_body());
    });
    let ws = Workspace::new(&server.base_url());

    let output = ws.run(&["harvest", "--json"]);
    assert_exit(&output, 60);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"error\":\"unknown_status\""), "stderr: {stderr}");
    assert!(active_json(&ws).is_empty());
}

#[test]
fn watch_runs_until_max_runs() {
    let server = MockServer::start();
    // Lower-case on the feed side so the second run sees an identical status.
    let police = server.mock(|when, then| {
        when.method(GET).path(POLICE_PATH);
        then.status(200).json_body(police_body("dispatched"));
    });
    server.mock(|when, then| {
        when.method(GET).path(FIRE_PATH);
        then.status(200).json_body(serde_json::json!([]));
    });
    let ws = Workspace::new(&server.base_url());

    let output = ws.run(&["watch", "--interval", "1", "--max-runs", "2", "--json"]);
    assert_exit(&output, 0);
    police.assert_calls(2);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let reports: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["categories"][0]["created"], 1);
    assert_eq!(reports[1]["categories"][0]["unchanged"], 1);
}

#[test]
fn bad_config_exits_3() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[harvest]\ninterval_secs = 0\n").unwrap();

    let output = callwatch()
        .arg("--config")
        .arg(&config)
        .args(["harvest"])
        .output()
        .expect("failed to run callwatch");
    assert_exit(&output, 3);
    assert!(String::from_utf8_lossy(&output.stderr).contains("interval_secs"));
}

#[test]
fn feed_url_flag_overrides_bad_config_url() {
    let server = MockServer::start();
    let police = server.mock(|when, then| {
        when.method(GET).path(POLICE_PATH);
        then.status(200).json_body(police_body("Dispatched"));
    });
    server.mock(|when, then| {
        when.method(GET).path(FIRE_PATH);
        then.status(200).json_body(serde_json::json!([]));
    });
    let ws = Workspace::new("not a url");

    let output = ws.run(&["harvest", "--feed-url", &server.base_url()]);
    assert_exit(&output, 0);
    police.assert();

    // Without the flag the file's value is still rejected.
    assert_exit(&ws.run(&["harvest"]), 3);
}

#[test]
fn missing_config_file_exits_3() {
    let output = callwatch()
        .args(["--config", "/definitely/not/here.toml", "config", "show"])
        .output()
        .expect("failed to run callwatch");
    assert_exit(&output, 3);
}

#[test]
fn config_path_and_show() {
    let ws = Workspace::new("http://127.0.0.1:9/api");

    let output = ws.run(&["config", "path"]);
    assert_exit(&output, 0);
    assert_eq!(
        Path::new(String::from_utf8_lossy(&output.stdout).trim()),
        ws.config().as_path()
    );

    let output = callwatch()
        .arg("--config")
        .arg(ws.config())
        .args(["config", "show"])
        .env("CALLWATCH_DB", "/srv/callwatch/calls.db")
        .output()
        .expect("failed to run callwatch");
    assert_exit(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("base_url = \"http://127.0.0.1:9/api\""), "{stdout}");
    assert!(stdout.contains("path = \"/srv/callwatch/calls.db\""), "{stdout}");
}

#[test]
fn unknown_subcommand_exits_2() {
    let output = callwatch().arg("frobnicate").output().expect("failed to run callwatch");
    assert_exit(&output, 2);
}
