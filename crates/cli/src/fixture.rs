//! A concrete driver backed by a static JSON fixture.
//!
//! The fixture supplies the page source, an element table keyed by
//! `(strategy, selector)`, default settings and canned log entries. Elements
//! can be made to appear a while after session start so the implicit wait
//! has something to wait for.
//!
//! ```json
//! {
//!   "pageSource": "<hierarchy/>",
//!   "elements": [
//!     {"strategy": "id", "selector": "login", "id": "el-1"},
//!     {"strategy": "xpath", "selector": "//row", "id": "el-2", "parent": "el-1", "appearsAfterMs": 1500}
//!   ],
//!   "settings": {"ignoreUnimportantViews": false},
//!   "logs": {"logcat": [{"message": "boot"}]}
//! }
//! ```

use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::time::Instant;
use tracing::debug;
use wd::{
	Automation, BoxFuture, Caps, DeviceSettings, Driver, DriverOptions, EXECUTE_DRIVER_SCRIPT, Error, FindRequest,
	LogType, Result,
};

/// Strategies accepted in any context.
pub const NATIVE_STRATEGIES: &[&str] = &["id", "xpath", "accessibility id", "class name"];
/// Strategies accepted only when the fixture declares a web context.
pub const WEB_STRATEGIES: &[&str] = &["css selector", "link text", "tag name"];
/// Insecure feature guarding `executeDriverScript`.
pub const DRIVER_SCRIPT_FEATURE: &str = "execute_driver_script";

const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fixture {
	pub page_source: String,
	pub web_context: bool,
	pub elements: Vec<FixtureElement>,
	pub settings: Map<String, Value>,
	pub logs: IndexMap<String, Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureElement {
	pub strategy: String,
	pub selector: String,
	pub id: String,
	/// Element this one is found under; `None` for root lookups.
	#[serde(default)]
	pub parent: Option<String>,
	/// Delay after session start before the element can be found.
	#[serde(default)]
	pub appears_after_ms: u64,
}

pub struct FixtureAutomation {
	page_source: String,
	web_context: bool,
	elements: Vec<FixtureElement>,
	session_started: Mutex<Option<Instant>>,
}

impl FixtureAutomation {
	pub fn new(fixture: &Fixture) -> Self {
		Self {
			page_source: fixture.page_source.clone(),
			web_context: fixture.web_context,
			elements: fixture.elements.clone(),
			session_started: Mutex::new(None),
		}
	}

	/// Ids of elements visible right now that satisfy `request`.
	fn visible_matches(&self, request: &FindRequest) -> Vec<String> {
		let elapsed = self
			.session_started
			.lock()
			.map(|started| started.elapsed())
			.unwrap_or_default();
		self.elements
			.iter()
			.filter(|el| el.strategy == request.strategy && el.selector == request.selector)
			.filter(|el| el.parent == request.context)
			.filter(|el| elapsed >= Duration::from_millis(el.appears_after_ms))
			.map(|el| el.id.clone())
			.collect()
	}
}

fn element_ref(id: &str) -> Value {
	json!({ "ELEMENT": id, W3C_ELEMENT_KEY: id })
}

impl Automation for FixtureAutomation {
	fn is_web_context(&self) -> bool {
		self.web_context
	}

	fn find_el_or_els<'a>(&'a self, driver: &'a Driver, request: &'a FindRequest) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move {
			let found = driver
				.timeouts()
				.wait_for_condition(|| {
					let ids = self.visible_matches(request);
					async move { Ok((!ids.is_empty()).then_some(ids)) }
				})
				.await;

			match found {
				Ok(ids) if request.multiple => Ok(ids.iter().map(|id| element_ref(id)).collect()),
				Ok(ids) => ids
					.first()
					.map(|id| element_ref(id))
					.ok_or_else(|| not_found(request)),
				Err(Error::Timeout(_)) if request.multiple => Ok(json!([])),
				Err(Error::Timeout(_)) => Err(not_found(request)),
				Err(err) => Err(err),
			}
		})
	}

	fn page_source<'a>(&'a self, _driver: &'a Driver) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(self.page_source.clone()) })
	}

	fn on_create_session<'a>(&'a self, _driver: &'a Driver, caps: &'a Caps) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			debug!(platform = ?caps.get("platformName"), "Fixture session starting");
			*self.session_started.lock() = Some(Instant::now());
			Ok(())
		})
	}

	fn on_delete_session<'a>(&'a self, _driver: &'a Driver) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			*self.session_started.lock() = None;
			Ok(())
		})
	}

	fn driver_data(&self) -> Value {
		json!({ "elements": self.elements.len(), "webContext": self.web_context })
	}

	fn status<'a>(&'a self) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async { Ok(json!({ "build": { "version": env!("CARGO_PKG_VERSION") } })) })
	}
}

fn not_found(request: &FindRequest) -> Error {
	Error::NoSuchElement(format!(
		"An element could not be located on the page using the given search parameters ({} = {:?})",
		request.strategy, request.selector
	))
}

#[derive(Debug, Deserialize)]
struct ScriptStep {
	command: String,
	#[serde(default)]
	args: Vec<Value>,
}

/// `executeDriverScript([{command, args}, ...])`: runs each step through the
/// dispatcher in order and returns their results. Stops at the first failure.
async fn execute_driver_script(driver: Driver, args: Vec<Value>) -> Result<Value> {
	driver.ensure_feature_enabled(DRIVER_SCRIPT_FEATURE)?;
	let script = args.into_iter().next().unwrap_or(Value::Null);
	let steps: Vec<ScriptStep> = serde_json::from_value(script)?;

	let mut results = Vec::with_capacity(steps.len());
	for step in steps {
		if step.command == EXECUTE_DRIVER_SCRIPT {
			return Err(Error::InvalidArgument("Driver scripts cannot be nested".to_string()));
		}
		results.push(driver.execute(&step.command, step.args).await?);
	}
	Ok(json!({ "result": results }))
}

/// Builds a driver around `fixture`.
pub fn build_driver(fixture: &Fixture, opts: DriverOptions) -> Result<Driver> {
	let mut builder = Driver::builder(FixtureAutomation::new(fixture))
		.options(opts)
		.locator_strategies(NATIVE_STRATEGIES.iter().copied())
		.web_locator_strategies(WEB_STRATEGIES.iter().copied())
		.insecure_features([DRIVER_SCRIPT_FEATURE])
		.settings(DeviceSettings::new(fixture.settings.clone()))
		.command(EXECUTE_DRIVER_SCRIPT, execute_driver_script)?;

	for (name, entries) in &fixture.logs {
		let entries = entries.clone();
		builder = builder.log_type(
			name.clone(),
			LogType::new(format!("'{name}' entries from the fixture"), move |_driver| Ok(entries.clone())),
		);
	}
	Ok(builder.build())
}
