//! NDJSON batch loop feeding [`Driver::execute`].
//!
//! # Protocol
//!
//! Each request line is a JSON object:
//!
//! | Field | Type | Description |
//! |-------|------|-------------|
//! | `id` | `string?` | Request identifier echoed in the response |
//! | `command` | `string` | Driver command name (e.g. `"createSession"`) |
//! | `args` | `array` | Positional command arguments |
//!
//! Each response is one JSON line:
//!
//! ```json
//! {"id":"1","ok":true,"command":"getTimeouts","data":{"command":60000,"implicit":0}}
//! {"id":"2","ok":false,"command":"getSession","error":{"code":"invalid session id","message":"..."}}
//! ```
//!
//! `error.code` is the W3C error code of the failure.
//!
//! # Host Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ping` | Health check, never touches the driver |
//! | `history` | Event history snapshot |
//! | `quit` / `exit` | Delete any live session and stop |
//!
//! End of input behaves like `quit` without a response line.

use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, warn};
use wd::{DELETE_SESSION, Driver, ErrorKind};

use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
	#[serde(default)]
	pub id: Option<String>,
	pub command: String,
	#[serde(default)]
	pub args: Vec<Value>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct BatchResponse {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<BatchError>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct BatchError {
	/// W3C error code, e.g. `"invalid session id"`.
	pub code: String,
	pub message: String,
}

impl BatchResponse {
	fn success(id: Option<String>, command: &str, data: Value) -> Self {
		Self {
			id,
			ok: true,
			command: command.to_string(),
			data: (!data.is_null()).then_some(data),
			error: None,
		}
	}

	fn error(id: Option<String>, command: &str, kind: ErrorKind, message: String) -> Self {
		Self {
			id,
			ok: false,
			command: command.to_string(),
			data: None,
			error: Some(BatchError {
				code: kind.w3c_code().to_string(),
				message,
			}),
		}
	}

	fn from_outcome(id: Option<String>, command: &str, outcome: wd::Result<Value>) -> Self {
		match outcome {
			Ok(data) => Self::success(id, command, data),
			Err(err) => Self::error(id, command, err.kind(), err.to_string()),
		}
	}
}

/// Reads requests from `reader` until `quit` or end of input, writing one
/// response per request to `out`.
///
/// Command failures are reported in the response stream; only I/O errors on
/// `out` end the loop with an error.
pub async fn run_batch<R, W>(driver: &Driver, reader: R, out: &mut W) -> Result<()>
where
	R: AsyncBufRead + Unpin,
	W: Write,
{
	let mut lines = reader.lines();
	loop {
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(e) => {
				error!(error = %e, "stdin read failed");
				break;
			}
		};

		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		let request: BatchRequest = match serde_json::from_str(line) {
			Ok(request) => request,
			Err(e) => {
				let response = BatchResponse::error(None, "unknown", ErrorKind::InvalidArgument, e.to_string());
				write_response(out, &response)?;
				continue;
			}
		};
		debug!(id = ?request.id, command = %request.command, "Batch request");

		let response = match request.command.as_str() {
			"ping" => BatchResponse::success(request.id, "ping", Value::Null),
			"history" => {
				let history = serde_json::to_value(driver.event_history())?;
				BatchResponse::success(request.id, "history", history)
			}
			"quit" | "exit" => {
				let outcome = end_session(driver).await;
				write_response(out, &BatchResponse::from_outcome(request.id, "quit", outcome))?;
				return Ok(());
			}
			command => {
				let outcome = driver.execute(command, request.args).await;
				BatchResponse::from_outcome(request.id, command, outcome)
			}
		};
		write_response(out, &response)?;
	}

	if let Err(err) = end_session(driver).await {
		warn!(error = %err, "Session cleanup at end of input failed");
	}
	Ok(())
}

async fn end_session(driver: &Driver) -> wd::Result<Value> {
	if !driver.has_session() {
		return Ok(Value::Null);
	}
	driver.execute(DELETE_SESSION, Vec::new()).await
}

fn write_response<W: Write>(out: &mut W, response: &BatchResponse) -> Result<()> {
	let json = serde_json::to_string(response)?;
	writeln!(out, "{json}")?;
	out.flush()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use wd::{DriverOptions, NullAutomation};

	use super::*;

	async fn run_lines(driver: &Driver, input: &str) -> Vec<Value> {
		let mut out = Vec::new();
		run_batch(driver, input.as_bytes(), &mut out).await.unwrap();
		String::from_utf8(out)
			.unwrap()
			.lines()
			.map(|line| serde_json::from_str(line).unwrap())
			.collect()
	}

	fn driver() -> Driver {
		Driver::builder(NullAutomation)
			.options(DriverOptions {
				idle_timeout_ms: 0,
				..DriverOptions::default()
			})
			.build()
	}

	#[tokio::test]
	async fn responses_echo_ids_and_codes() {
		let driver = driver();
		let input = concat!(
			"{\"id\":\"1\",\"command\":\"ping\"}\n",
			"\n",
			"{\"id\":\"2\",\"command\":\"getSession\"}\n",
			"{\"id\":\"3\",\"command\":\"createSession\",\"args\":[{\"platformName\":\"Android\"}]}\n",
			"not json\n",
			"{\"id\":\"4\",\"command\":\"bogus\"}\n",
		);
		let lines = run_lines(&driver, input).await;

		assert_eq!(lines.len(), 5);
		assert_eq!(lines[0], json!({"id": "1", "ok": true, "command": "ping"}));
		assert_eq!(lines[1]["error"]["code"], "invalid session id");
		assert_eq!(lines[2]["ok"], true);
		assert!(lines[2]["data"]["sessionId"].is_string());
		assert_eq!(lines[3]["command"], "unknown");
		assert_eq!(lines[3]["error"]["code"], "invalid argument");
		assert_eq!(lines[4]["error"]["code"], "unknown method");

		// end of input tears the session down
		assert!(!driver.has_session());
	}

	#[tokio::test]
	async fn quit_stops_reading() {
		let driver = driver();
		let input = concat!(
			"{\"command\":\"createSession\",\"args\":[{\"platformName\":\"Android\"}]}\n",
			"{\"id\":\"q\",\"command\":\"quit\"}\n",
			"{\"command\":\"ping\"}\n",
		);
		let lines = run_lines(&driver, input).await;

		assert_eq!(lines.len(), 2);
		assert_eq!(lines[1], json!({"id": "q", "ok": true, "command": "quit"}));
		assert!(!driver.has_session());
	}

	#[tokio::test]
	async fn history_reports_commands() {
		let driver = driver();
		let input = concat!(
			"{\"command\":\"createSession\",\"args\":[{\"platformName\":\"Android\"}]}\n",
			"{\"command\":\"history\"}\n",
		);
		let lines = run_lines(&driver, input).await;

		let history = &lines[1]["data"];
		assert_eq!(history["commands"][0]["command"], "createSession");
		assert_eq!(history["newSessionStarted"].as_array().map(Vec::len), Some(1));
	}
}
