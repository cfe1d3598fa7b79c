use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;
use wd_protocol::{Caps, Dialect, W3cCapabilities, strip_vendor_prefix};

use crate::driver::{Driver, Session};
use crate::error::{Error, Result};
use crate::history::now_ms;
use crate::timeouts::parse_timeout_value;

pub(super) async fn create_session(driver: Driver, args: Vec<Value>) -> Result<Value> {
	if let Some(id) = driver.session_id() {
		return Err(Error::SessionNotCreated(format!(
			"Cannot create a new session while session '{id}' is still active"
		)));
	}

	let caps = resolve_capabilities(&driver, &args)?;
	driver.set_original_caps(caps.clone());
	start_session(&driver, caps).await
}

/// Picks the capability set to start a session with.
///
/// W3C requests try each `firstMatch` candidate in order and take the first
/// that validates. JSONWP requests merge desired and required capabilities.
fn resolve_capabilities(driver: &Driver, args: &[Value]) -> Result<Caps> {
	let opts = driver.opts();
	let dialect = driver.negotiator().dialect().unwrap_or(Dialect::JsonWire);

	if dialect == Dialect::W3c {
		let w3c = W3cCapabilities::from_args(args)?
			.ok_or_else(|| Error::SessionNotCreated("No W3C capabilities were provided".to_string()))?;
		let candidates = w3c.candidates(&opts.vendor_prefix)?;
		if !opts.validate_caps {
			return Ok(candidates.into_iter().next().unwrap_or_default());
		}

		let mut reasons = Vec::new();
		for candidate in candidates {
			match driver.constraints().validate(&candidate) {
				Ok(_) => return Ok(candidate),
				Err(Error::SessionNotCreated(reason)) => reasons.push(reason),
				Err(other) => return Err(other),
			}
		}
		return Err(Error::SessionNotCreated(reasons.join(" | ")));
	}

	let mut caps = Caps::new();
	for source in args.iter().take(2).filter_map(Value::as_object) {
		caps.extend(strip_vendor_prefix(source, &opts.vendor_prefix));
	}
	driver.validate_desired_caps(&caps)?;
	Ok(caps)
}

/// Applies well-known capabilities, runs the backend hook, and installs the session.
async fn start_session(driver: &Driver, caps: Caps) -> Result<Value> {
	if let Some(timeout) = caps.get("newCommandTimeout").filter(|v| !v.is_null()) {
		let seconds = parse_timeout_value(timeout)?;
		driver.timeouts().set_idle_timeout(seconds.saturating_mul(1000));
	}
	if let Some(print) = caps.get("printPageSourceOnFindFailure").and_then(Value::as_bool) {
		driver.update_opts(|opts| opts.print_page_source_on_find_failure = print);
	}

	driver.automation().on_create_session(driver, &caps).await?;

	let session = Session {
		id: Uuid::new_v4().to_string(),
		capabilities: caps,
		dialect: driver.negotiator().dialect().unwrap_or(Dialect::JsonWire),
		created_at: now_ms(),
	};
	info!(target = "wd", session_id = %session.id, dialect = %session.dialect, "Session created");
	let response = json!({
		"sessionId": session.id,
		"capabilities": session.capabilities,
	});
	driver.install_session(session);
	Ok(response)
}

pub(super) async fn delete_session(driver: Driver, _args: Vec<Value>) -> Result<Value> {
	end_session(&driver).await?;
	Ok(Value::Null)
}

/// Tears down the live session. A no-op without one.
///
/// The session is cleared even when the backend hook fails; the hook's error
/// is returned afterwards.
async fn end_session(driver: &Driver) -> Result<()> {
	let Some(id) = driver.session_id() else {
		debug!(target = "wd", "No session to delete");
		return Ok(());
	};
	let hook = driver.automation().on_delete_session(driver).await;
	driver.timeouts().clear_idle_timer();
	driver.clear_session();
	info!(target = "wd", session_id = %id, "Session deleted");
	hook
}

pub(super) async fn get_session(driver: Driver, _args: Vec<Value>) -> Result<Value> {
	let session = driver.session().ok_or_else(Error::no_session)?;
	Ok(Value::Object(session.capabilities))
}

pub(super) async fn get_sessions(driver: Driver, _args: Vec<Value>) -> Result<Value> {
	let sessions = match driver.session() {
		Some(session) => vec![json!({
			"id": session.id,
			"capabilities": session.capabilities,
			"driverData": driver.automation().driver_data(),
		})],
		None => Vec::new(),
	};
	Ok(Value::Array(sessions))
}

pub(super) async fn get_status(driver: Driver, _args: Vec<Value>) -> Result<Value> {
	driver.automation().status().await
}

/// Recreates the session from its original capabilities, keeping timeouts.
pub(super) async fn reset(driver: Driver, _args: Vec<Value>) -> Result<Value> {
	debug!(target = "wd", "Resetting session");
	let caps = driver.original_caps().ok_or_else(Error::no_session)?;
	let idle_timeout_ms = driver.timeouts().idle_timeout_ms();
	let implicit_wait_ms = driver.timeouts().implicit_wait_ms();

	let restarted = match end_session(&driver).await {
		Ok(()) => start_session(&driver, caps).await.map(|_| ()),
		Err(e) => Err(e),
	};

	driver.timeouts().set_idle_timeout(idle_timeout_ms);
	driver.timeouts().set_implicit_wait(implicit_wait_ms);
	restarted.map(|()| Value::Null)
}
