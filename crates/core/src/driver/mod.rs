//! The per-session driver.
//!
//! [`Driver`] is a cheap, cloneable handle around shared state. One driver
//! holds at most one live [`Session`]. Commands enter through
//! [`Driver::execute`] (see `execute.rs`), which serializes them, keeps the
//! idle timer honest, and races each handler against the unexpected-shutdown
//! signal.
//!
//! # Example
//!
//! ```ignore
//! let driver = Driver::builder(NullAutomation).build();
//! let created = driver
//!     .execute("createSession", vec![json!({"platformName": "Android"})])
//!     .await?;
//! driver.execute("deleteSession", vec![]).await?;
//! ```

mod builder;
mod execute;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;
use wd_protocol::{Caps, Dialect};

pub use builder::DriverBuilder;

use crate::automation::Automation;
use crate::capabilities::{Constraints, ValidationReport};
use crate::commands::CommandTable;
use crate::error::{Error, Result};
use crate::history::{EventHistory, HistoryLog};
use crate::logs::LogTypes;
use crate::managed::{ManagedDriver, TimeoutSettings};
use crate::negotiator::DialectNegotiator;
use crate::options::DriverOptions;
use crate::proxy::should_avoid;
use crate::security::SecurityPolicy;
use crate::settings::DeviceSettings;
use crate::shutdown::{ListenerId, ShutdownSignal};
use crate::timeouts::TimeoutController;

/// The live session of a driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	pub id: String,
	pub capabilities: Caps,
	pub dialect: Dialect,
	/// Milliseconds since the Unix epoch.
	pub created_at: u64,
}

pub(crate) struct DriverInner {
	automation: Arc<dyn Automation>,
	commands: CommandTable,
	opts: RwLock<DriverOptions>,
	constraints: Constraints,
	locator_strategies: Vec<String>,
	web_locator_strategies: Vec<String>,
	security: SecurityPolicy,
	session: RwLock<Option<Session>>,
	original_caps: RwLock<Option<Caps>>,
	negotiator: DialectNegotiator,
	timeouts: TimeoutController,
	shutdown: ShutdownSignal,
	queue: tokio::sync::Mutex<()>,
	in_flight: AtomicUsize,
	history: HistoryLog,
	settings: DeviceSettings,
	log_types: LogTypes,
}

#[derive(Clone)]
pub struct Driver {
	inner: Arc<DriverInner>,
}

impl Driver {
	pub fn builder<A: Automation>(automation: A) -> DriverBuilder {
		DriverBuilder::new(automation)
	}

	pub fn automation(&self) -> &dyn Automation {
		self.inner.automation.as_ref()
	}

	pub fn commands(&self) -> &CommandTable {
		&self.inner.commands
	}

	/// Snapshot of the current options.
	pub fn opts(&self) -> DriverOptions {
		self.inner.opts.read().clone()
	}

	pub(crate) fn update_opts(&self, update: impl FnOnce(&mut DriverOptions)) {
		update(&mut self.inner.opts.write());
	}

	pub fn constraints(&self) -> &Constraints {
		&self.inner.constraints
	}

	pub fn security(&self) -> &SecurityPolicy {
		&self.inner.security
	}

	pub fn negotiator(&self) -> &DialectNegotiator {
		&self.inner.negotiator
	}

	pub fn timeouts(&self) -> &TimeoutController {
		&self.inner.timeouts
	}

	pub fn settings(&self) -> &DeviceSettings {
		&self.inner.settings
	}

	pub fn log_types(&self) -> &LogTypes {
		&self.inner.log_types
	}

	pub fn session(&self) -> Option<Session> {
		self.inner.session.read().clone()
	}

	pub fn session_id(&self) -> Option<String> {
		self.inner.session.read().as_ref().map(|s| s.id.clone())
	}

	pub fn has_session(&self) -> bool {
		self.inner.session.read().is_some()
	}

	/// True only for a non-empty id equal to the live session's.
	pub fn session_exists(&self, session_id: &str) -> bool {
		!session_id.is_empty() && self.session_id().as_deref() == Some(session_id)
	}

	/// The driver serving `session_id`. A driver holds a single session, so this is `self`.
	pub fn driver_for_session(&self, _session_id: &str) -> &Driver {
		self
	}

	pub(crate) fn install_session(&self, session: Session) {
		*self.inner.session.write() = Some(session);
	}

	pub(crate) fn clear_session(&self) {
		*self.inner.session.write() = None;
	}

	/// Capabilities the first session was created with; `reset` reuses them.
	pub fn original_caps(&self) -> Option<Caps> {
		self.inner.original_caps.read().clone()
	}

	pub(crate) fn set_original_caps(&self, caps: Caps) {
		*self.inner.original_caps.write() = Some(caps);
	}

	/// Validates `caps` against this driver's schema.
	///
	/// Returns `None` when validation is switched off.
	pub fn validate_desired_caps(&self, caps: &Caps) -> Result<Option<ValidationReport>> {
		if !self.inner.opts.read().validate_caps {
			return Ok(None);
		}
		self.inner.constraints.validate(caps).map(Some)
	}

	pub fn validate_locator_strategy(&self, strategy: &str, web_context: bool) -> Result<()> {
		let inner = &self.inner;
		debug!(
			target = "wd",
			strategies = ?inner.locator_strategies,
			web_context,
			"Valid locator strategies for this request"
		);
		let native = inner.locator_strategies.iter().any(|s| s == strategy);
		let web = web_context && inner.web_locator_strategies.iter().any(|s| s == strategy);
		if native || web {
			return Ok(());
		}
		Err(Error::InvalidSelector(format!(
			"Locator Strategy '{strategy}' is not supported for this session"
		)))
	}

	pub fn is_feature_enabled(&self, name: &str) -> Result<bool> {
		self.inner.security.is_feature_enabled(name)
	}

	pub fn ensure_feature_enabled(&self, name: &str) -> Result<()> {
		self.inner.security.ensure_feature_enabled(name)
	}

	/// Whether `(method, url)` must be handled locally instead of proxied.
	pub fn proxy_route_is_avoided(&self, session_id: Option<&str>, method: &str, url: &str) -> Result<bool> {
		let rules = self.inner.automation.proxy_avoid_list(session_id)?;
		Ok(should_avoid(method, url, &rules, &self.inner.opts.read().base_path))
	}

	/// Whether a request for `session_id` goes to the remote endpoint.
	///
	/// Requires a backend that can proxy and currently does, and a route not
	/// on the avoid list.
	pub fn should_proxy(&self, session_id: Option<&str>, method: &str, url: &str) -> Result<bool> {
		let automation = &self.inner.automation;
		if !automation.can_proxy(session_id) || !automation.proxy_active(session_id) {
			return Ok(false);
		}
		Ok(!self.proxy_route_is_avoided(session_id, method, url)?)
	}

	/// Records a named event in the history.
	pub fn log_event(&self, name: &str) -> Result<u64> {
		self.inner.history.log_event(name)
	}

	/// Detached copy of the event history.
	pub fn event_history(&self) -> EventHistory {
		self.inner.history.snapshot()
	}

	/// Registers code to run when the driver shuts down unexpectedly.
	///
	/// Registrations accumulate; registering twice runs the listener twice.
	pub fn on_unexpected_shutdown<F, Fut>(&self, listener: F) -> ListenerId
	where
		F: Fn(Error) -> Fut + Send + Sync + 'static,
		Fut: std::future::Future<Output = Result<()>> + Send + 'static,
	{
		self.inner.shutdown.on_shutdown(listener)
	}

	pub fn shutdown_signal(&self) -> &ShutdownSignal {
		&self.inner.shutdown
	}

	pub fn add_managed_driver(&self, child: Arc<dyn ManagedDriver>) {
		self.inner.timeouts.managed().add(child);
	}

	pub fn managed_drivers(&self) -> Vec<Arc<dyn ManagedDriver>> {
		self.inner.timeouts.managed().list()
	}
}

impl TimeoutSettings for Driver {
	fn set_idle_timeout(&self, ms: u64) {
		self.inner.timeouts.set_idle_timeout(ms);
	}

	fn set_implicit_wait(&self, ms: u64) {
		self.inner.timeouts.set_implicit_wait(ms);
	}
}

impl ManagedDriver for Driver {
	fn timeout_settings(&self) -> Option<&dyn TimeoutSettings> {
		Some(self)
	}
}

impl std::fmt::Debug for Driver {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Driver")
			.field("session_id", &self.session_id())
			.field("dialect", &self.inner.negotiator.dialect())
			.field("timeouts", &self.inner.timeouts)
			.finish_non_exhaustive()
	}
}
