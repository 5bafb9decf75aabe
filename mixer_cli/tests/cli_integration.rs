use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Fast sim config: no notice hold, short polls and a 1 ms/percent table.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[pins]
# pins are unused in sim backend but must be present
auto_switch = 17
manual_switch = 27
confirm_switch = 22
cancel_switch = 17
encoder_clk = 5
encoder_dt = 6
pumps = [12, 16, 20, 21]

[input]
settle_ms = 5

[timing]
poll_ms = 10
notice_ms = 0
tick_ms = 1

[calibration]
durations_ms = [0, 20, 40, 60, 80, 100]
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn mixer() -> Command {
    Command::cargo_bin("mixer").unwrap()
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["table"], 0, "100%  100 ms", "stdout")]
#[case(&["self-check"], 0, "ok", "stdout")]
#[case(&["dispense", "--ingredient", "1", "--percent", "40"], 0, "MANGO 40%: Completed", "stdout")]
#[case(&["dispense", "--ingredient", "1", "--percent", "30"], 2, "not a dispensable percentage", "stderr")]
#[case(&["dispense", "--ingredient", "7", "--percent", "20"], 2, "slot 7", "stderr")]
#[case(&["dispense", "--ingredient", "1"], 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = mixer();
    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn cli_reports_bad_calibration_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let bad_csv = dir.path().join("calib.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "percent,value").unwrap();
    writeln!(f, "0,0").unwrap();
    writeln!(f, "20,100").unwrap();

    mixer()
        .arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&bad_csv)
        .arg("table")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn calibration_csv_overrides_config_table() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv = dir.path().join("calib.csv");
    fs::write(&csv, "percent,ms\n0,0\n20,5\n40,10\n60,15\n80,20\n100,25\n").unwrap();

    let out = mixer()
        .arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&csv)
        .arg("--json")
        .arg("table")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v[5]["percent"], 100);
    assert_eq!(v[5]["ms"], 25);
}

#[rstest]
fn invalid_config_exits_with_two() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    let text = fs::read_to_string(write_valid_config(&dir))
        .unwrap()
        .replace("poll_ms = 10", "poll_ms = 0");
    fs::write(&path, text).unwrap();

    mixer()
        .arg("--config")
        .arg(&path)
        .arg("--json")
        .arg("table")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("\"reason\":\"InvalidConfig\""));
}

#[rstest]
fn scripted_manual_session_runs_to_completion() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let script = dir.path().join("panel.txt");
    fs::write(&script, "# pick MANGO and pour\n20 manual\n200 cw\n400 confirm\n").unwrap();

    mixer()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--script")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("|Push Switch 1"))
        .stdout(predicate::str::contains("|Enjoy"))
        .stdout(predicate::str::contains("session 1: manual: MANGO Completed"))
        .stdout(predicate::str::contains("stopped: InputExhausted"));
}

#[rstest]
fn scripted_auto_session_reports_json_summary() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let script = dir.path().join("panel.txt");
    fs::write(
        &script,
        "20 auto\n200 cw\n300 confirm\n500 confirm\n700 cw\n800 cw\n900 confirm\n1100 confirm\n",
    )
    .unwrap();

    let out = mixer()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("run")
        .arg("--script")
        .arg(&script)
        .arg("--sessions")
        .arg("1")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(out).unwrap();
    let last = text.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["stopped"], "SessionLimit");
    assert_eq!(v["sessions"][0]["mode"], "auto");
    assert_eq!(v["sessions"][0]["total"], 60);
    assert_eq!(v["sessions"][0]["actuations"][2]["percent"], 40);
}

#[rstest]
fn bad_script_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let script = dir.path().join("panel.txt");
    fs::write(&script, "20 auto\nlater confirm\n").unwrap();

    mixer()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--script")
        .arg(&script)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("panel script"));
}
