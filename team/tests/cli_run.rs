use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use team::exit_codes;
use team::test_support::{TempTeam, fast_config};
use wait_timeout::ChildExt;

fn team_cmd(config: &Path, args: &[&str]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_team"))
        .arg("--config")
        .arg(config)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn team");

    match child.wait_timeout(Duration::from_secs(30)).expect("wait") {
        Some(_) => child.wait_with_output().expect("output"),
        None => {
            let _ = child.kill();
            panic!("team {args:?} did not exit in time");
        }
    }
}

#[test]
fn run_writes_report_and_exits_ok() {
    let temp = TempTeam::new(&fast_config()).expect("temp team");
    let report = temp.path().join("report.json");
    let report_arg = report.to_string_lossy().to_string();

    let output = team_cmd(
        temp.config_path(),
        &["run", "--silent", "--report", &report_arg],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let raw = std::fs::read_to_string(&report).expect("report");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(json["plan"], "diagnosticTeam");
    assert_eq!(json["completed"], true);
    let steps = json["steps"].as_array().expect("steps");
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0]["goal"], "CONFIGURE_DIAGNOSTICS");
    assert_eq!(steps[0]["agent"], "Marvin");
    assert!(steps.iter().all(|step| step["outcome"] == "passed"));
}

#[test]
fn run_prints_each_step_and_exit_line() {
    let mut cfg = fast_config();
    cfg.silent = false;
    let temp = TempTeam::new(&cfg).expect("temp team");

    let output = team_cmd(temp.config_path(), &["run"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CONFIGURE_DIAGNOSTICS: passed"));
    assert!(stdout.contains("REPORT_FAULTS: passed"));
    assert!(stdout.trim_end().ends_with("Exiting diagnosticTeam."));
}

#[test]
fn validate_rejects_unknown_agent() {
    let temp = TempTeam::new(&fast_config()).expect("temp team");
    std::fs::write(
        temp.config_path(),
        "agents = [\"Marvin\"]\n\n[[steps]]\ngoal = \"WATCH_FOR_FAULTS\"\nagent = \"Nobody\"\n",
    )
    .expect("write config");

    let output = team_cmd(temp.config_path(), &["validate"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Nobody"), "stderr: {stderr}");
}

#[test]
fn plan_lists_steps_in_order() {
    let temp = TempTeam::new(&fast_config()).expect("temp team");

    let output = team_cmd(temp.config_path(), &["plan"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "0. CONFIGURE_DIAGNOSTICS -> Marvin",
            "1. WATCH_FOR_FAULTS -> inline",
            "2. DIAGNOSE_FAULTS -> inline",
            "3. REPORT_FAULTS -> inline (final)",
        ]
    );
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let temp = TempTeam::new(&fast_config()).expect("temp team");
    let fresh = temp.path().join("fresh.toml");

    let created = team_cmd(&fresh, &["init"]);
    assert_eq!(created.status.code(), Some(exit_codes::OK));
    assert!(fresh.exists());

    let refused = team_cmd(&fresh, &["init"]);
    assert_eq!(refused.status.code(), Some(exit_codes::INVALID));

    let forced = team_cmd(&fresh, &["init", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}
