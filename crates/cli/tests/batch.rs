use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::{Value, json};

fn run_wd(args: &[&str], lines: &[&str]) -> (bool, String, String) {
	let mut child = Command::new(env!("CARGO_BIN_EXE_wd"))
		.args(args)
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.expect("failed to start wd");

	{
		let stdin = child.stdin.as_mut().expect("stdin unavailable");
		for line in lines {
			writeln!(stdin, "{line}").expect("failed to write request");
		}
	}

	let output = child.wait_with_output().expect("failed waiting for wd");
	let stdout = String::from_utf8_lossy(&output.stdout).to_string();
	let stderr = String::from_utf8_lossy(&output.stderr).to_string();
	(output.status.success(), stdout, stderr)
}

fn parse_ndjson(stdout: &str) -> Vec<Value> {
	stdout
		.lines()
		.filter(|line| !line.trim().is_empty())
		.map(|line| serde_json::from_str::<Value>(line).expect("line should be valid JSON"))
		.collect()
}

fn fixture_file() -> tempfile::NamedTempFile {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	let fixture = json!({
		"pageSource": "<hierarchy><button id=\"go\"/></hierarchy>",
		"elements": [{"strategy": "id", "selector": "go", "id": "el-go"}],
		"logs": {"logcat": [{"message": "ready"}]}
	});
	write!(file, "{fixture}").unwrap();
	file
}

#[test]
fn session_roundtrip_over_stdin() {
	let fixture = fixture_file();
	let path = fixture.path().to_str().unwrap();
	let (success, stdout, stderr) = run_wd(
		&["run", "--fixture", path, "--idle-timeout-ms", "0"],
		&[
			r#"{"id":"1","command":"createSession","args":[{"capabilities":{"alwaysMatch":{"platformName":"Android"},"firstMatch":[{}]}}]}"#,
			r#"{"id":"2","command":"findElement","args":["id","go"]}"#,
			r#"{"id":"3","command":"findElement","args":["id","missing"]}"#,
			r#"{"id":"4","command":"getLog","args":["logcat"]}"#,
			r#"{"id":"5","command":"timeouts","args":[null,null,null,null,1500]}"#,
			r#"{"id":"6","command":"getTimeouts"}"#,
			r#"{"id":"7","command":"quit"}"#,
		],
	);

	assert!(success, "wd run failed: {stderr}");
	let lines = parse_ndjson(&stdout);
	assert_eq!(lines.len(), 7, "unexpected output: {stdout}");

	assert_eq!(lines[0]["ok"], true);
	assert!(lines[0]["data"]["sessionId"].is_string());
	assert_eq!(lines[1]["data"]["ELEMENT"], "el-go");
	assert_eq!(lines[2]["error"]["code"], "no such element");
	assert_eq!(lines[3]["data"], json!([{"message": "ready"}]));
	assert_eq!(lines[5]["data"], json!({"command": 0, "implicit": 1500}));
	assert_eq!(lines[6], json!({"id": "7", "ok": true, "command": "quit"}));
}

#[test]
fn driver_script_gated_by_insecure_flag() {
	let script = r#"{"id":"s","command":"executeDriverScript","args":[[{"command":"getStatus"},{"command":"logEvent","args":["scripted"]}]]}"#;
	let create = r#"{"command":"createSession","args":[{"platformName":"Android"}]}"#;

	let (success, stdout, stderr) = run_wd(&["run", "--idle-timeout-ms", "0"], &[create, script]);
	assert!(success, "wd run failed: {stderr}");
	let lines = parse_ndjson(&stdout);
	assert_eq!(lines[1]["ok"], false);
	assert_eq!(lines[1]["id"], "s");

	let (success, stdout, stderr) = run_wd(
		&["run", "--idle-timeout-ms", "0", "--allow-insecure", "execute_driver_script"],
		&[create, script, r#"{"command":"getLogEvents","args":["scripted"]}"#],
	);
	assert!(success, "wd run failed: {stderr}");
	let lines = parse_ndjson(&stdout);
	assert_eq!(lines[1]["ok"], true, "script failed: {}", lines[1]);
	assert!(lines[1]["data"]["result"][0]["build"].is_object());
	assert_eq!(lines[2]["data"]["scripted"].as_array().map(Vec::len), Some(1));
}

#[test]
fn caps_subcommand_reports_findings() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	write!(file, r#"{{"platformName":"Android","frobnicate":true}}"#).unwrap();

	let (success, stdout, stderr) = run_wd(&["caps", file.path().to_str().unwrap()], &[]);
	assert!(success, "wd caps failed: {stderr}");
	let summary: Value = serde_json::from_str(&stdout).unwrap();
	assert_eq!(summary["unrecognized"], json!(["frobnicate"]));
}

#[test]
fn caps_subcommand_rejects_invalid_object() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	write!(file, r#"{{"deviceName":"pixel"}}"#).unwrap();

	let (success, _stdout, stderr) = run_wd(&["caps", file.path().to_str().unwrap()], &[]);
	assert!(!success);
	assert!(stderr.contains("platformName"), "stderr: {stderr}");
}
